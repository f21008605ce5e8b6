//! file: core/src/backend/micropython.rs
//! description: indentation-based script backend for MicroPython boards.
//!
//! The entry point renders as module-level setup code followed by a
//! `while True:` loop. Functions are plain `def`s that declare `global` for
//! every module variable they assign. Imports, pin objects and timer state
//! are deferred declarations at the top of the file.

use std::collections::BTreeSet;

use crate::codegen::{Code, CodeGen, ORDER_ATOMIC, ORDER_NONE, Order};
use crate::graph::Node;

use super::{
    Backend, Formatting, LOOP_TYPES, TypeSet, call_arguments, flag, identifier, numeric_literal,
    parameters, suffix,
};

// Python operator precedence, tightest first.
pub const ORDER_COLLECTION: Order = 1; // tuples, lists, dictionaries
pub const ORDER_MEMBER: Order = 2; // . []
pub const ORDER_FUNCTION_CALL: Order = 2; // ()
pub const ORDER_EXPONENTIATION: Order = 3; // **
pub const ORDER_UNARY_SIGN: Order = 4; // + -
pub const ORDER_BITWISE_NOT: Order = 4; // ~
pub const ORDER_MULTIPLICATIVE: Order = 5; // * / // %
pub const ORDER_ADDITIVE: Order = 6; // + -
pub const ORDER_BITWISE_SHIFT: Order = 7;
pub const ORDER_BITWISE_AND: Order = 8;
pub const ORDER_BITWISE_XOR: Order = 9;
pub const ORDER_BITWISE_OR: Order = 10;
pub const ORDER_RELATIONAL: Order = 11; // in, not in, is, is not, <, <=, >, >=, <>, !=, ==
pub const ORDER_LOGICAL_NOT: Order = 12;
pub const ORDER_LOGICAL_AND: Order = 13;
pub const ORDER_LOGICAL_OR: Order = 14;
pub const ORDER_CONDITIONAL: Order = 15;
pub const ORDER_LAMBDA: Order = 16;

pub const ENTRY_POINT: &str = "micropython_entry";

pub(crate) fn backend() -> Backend {
    let mut backend = Backend::new(
        "micropython",
        "MicroPython",
        Formatting {
            statement_separator: "",
            comment_prefix: "#",
            indent: "    ",
            empty_body: Some("pass"),
            entry_points_last: true,
        },
    );

    backend.containers = TypeSet::new(&[ENTRY_POINT, "procedures_defnoreturn", "procedures_defreturn"]);
    backend.entry_points = TypeSet::new(&[ENTRY_POINT]);
    backend.always_emitted = TypeSet::new(&["serial_setup", "servo_attach", "interrupt_attach"]);

    backend
        .generators
        .register(ENTRY_POINT, entry)
        .register("procedures_defnoreturn", procedure)
        .register("procedures_defreturn", procedure)
        .register("serial_setup", serial_setup)
        .register("servo_attach", servo_attach)
        .register("interrupt_attach", interrupt_attach)
        .register("controls_if", controls_if)
        .register("controls_repeat_ext", controls_repeat)
        .register("controls_whileUntil", controls_while_until)
        .register("controls_for", controls_for)
        .register("controls_flow_statements", controls_flow)
        .register("procedures_return", procedure_return)
        .register("time_every", time_every)
        .register("variables_set", variables_set)
        .register("io_digitalwrite", digital_write)
        .register("io_analogwrite", analog_write)
        .register("serial_print", serial_print)
        .register("time_delay", time_delay)
        .register("servo_write", servo_write)
        .register("procedures_callnoreturn", call_no_return)
        .register("math_number", math_number)
        .register("math_arithmetic", math_arithmetic)
        .register("logic_boolean", logic_boolean)
        .register("logic_compare", logic_compare)
        .register("logic_operation", logic_operation)
        .register("logic_negate", logic_negate)
        .register("text", text)
        .register("variables_get", variables_get)
        .register("io_digitalread", digital_read)
        .register("io_analogread", analog_read)
        .register("time_millis", time_millis)
        .register("procedures_callreturn", call_return);

    backend
}

fn import_pin(ctx: &mut CodeGen<'_>) {
    ctx.ensure_declared("import_pin", "from machine import Pin");
}

fn import_time(ctx: &mut CodeGen<'_>) {
    ctx.ensure_declared("import_time", "import time");
}

fn timer_state(node: &Node) -> String {
    format!("every_{}_last", node.symbol_suffix())
}

fn entry(ctx: &mut CodeGen<'_>, node: &Node) -> Code {
    ctx.note_entry_point(node);
    ctx.run_always_emitted_pass();

    let setup_body = match node.statement("SETUP") {
        Some(head) => ctx.chain_to_code(head),
        None => String::new(),
    };
    let loop_body = ctx.statement_body(node, "LOOP");

    let mut code = ctx.setups().flush();
    code.push_str(&setup_body);
    if !code.is_empty() {
        code.push('\n');
    }
    code.push_str("while True:\n");
    code.push_str(&loop_body);

    Code::Statement(code)
}

/// Module variables a function body assigns, which Python needs declared
/// `global` to write.
fn assigned_globals(ctx: &CodeGen<'_>, node: &Node, params: &[String]) -> BTreeSet<String> {
    let graph = ctx.graph();
    let mut names = BTreeSet::new();

    for id in graph.descendants(node.id()) {
        let inner = graph.node(id);
        match inner.node_type() {
            "variables_set" => {
                names.insert(identifier(inner.field_or("VAR", ""), "item"));
            }
            "controls_for" => {
                names.insert(identifier(inner.field_or("VAR", ""), "i"));
            }
            "time_every" => {
                names.insert(timer_state(inner));
            }
            _ => {}
        }
    }

    for p in params {
        names.remove(p);
    }
    names
}

fn procedure(ctx: &mut CodeGen<'_>, node: &Node) -> Code {
    let name = identifier(node.field_or("NAME", ""), "do_something");
    let params = parameters(node);

    let mut body = String::new();
    let globals = assigned_globals(ctx, node, &params);
    if !globals.is_empty() {
        let line = format!("global {}\n", globals.into_iter().collect::<Vec<_>>().join(", "));
        body.push_str(&ctx.indent(&line));
    }

    let stack = ctx.statements_to_code(node, "STACK");
    let mut returned = String::new();
    if node.node_type() == "procedures_defreturn" {
        if let Some(value) = ctx.value_to_code(node, "RETURN", ORDER_NONE) {
            returned = ctx.indent(&ctx.line(&format!("return {}", value)));
        }
    }

    if stack.trim().is_empty() && returned.is_empty() {
        body.push_str(&ctx.indent("pass\n"));
    } else {
        body.push_str(&stack);
        body.push_str(&returned);
    }

    Code::Statement(format!("def {}({}):\n{}", name, params.join(", "), body))
}

fn serial_setup(ctx: &mut CodeGen<'_>, node: &Node) -> Code {
    let baud = node.field_or("BAUD", "115200");
    ctx.ensure_declared("import_uart", "from machine import UART");
    ctx.ensure_setup("serial_begin", &format!("uart = UART(0, baudrate={})", baud));
    Code::empty()
}

fn servo_attach(ctx: &mut CodeGen<'_>, node: &Node) -> Code {
    let name = identifier(node.field_or("NAME", ""), "servo");
    let pin = node.field_or("PIN", "15");
    import_pin(ctx);
    ctx.ensure_declared("import_pwm", "from machine import PWM");
    ctx.ensure_setup(
        &format!("servo_attach_{}", name),
        &format!("{} = PWM(Pin({}), freq=50)", name, pin),
    );
    Code::empty()
}

fn interrupt_attach(ctx: &mut CodeGen<'_>, node: &Node) -> Code {
    let pin = node.field_or("PIN", "2");
    let trigger = match node.field_or("MODE", "RISING") {
        "FALLING" => "Pin.IRQ_FALLING",
        "CHANGE" => "Pin.IRQ_RISING | Pin.IRQ_FALLING",
        "RISING" => "Pin.IRQ_RISING",
        other => {
            log::warn!("interrupt mode '{}' on '{}' unknown; using RISING", other, node.key());
            "Pin.IRQ_RISING"
        }
    };
    let handler = identifier(node.field_or("HANDLER", ""), "on_interrupt");
    let pin_var = format!("pin_irq_{}", suffix(pin));

    import_pin(ctx);
    ctx.ensure_setup(&pin_var, &format!("{} = Pin({}, Pin.IN)", pin_var, pin));
    ctx.ensure_setup(
        &format!("interrupt_{}", pin),
        &format!(
            "{}.irq(trigger={}, handler=lambda p: {}())",
            pin_var, trigger, handler
        ),
    );
    Code::empty()
}

fn controls_if(ctx: &mut CodeGen<'_>, node: &Node) -> Code {
    if !ctx.in_allowed_context(node) {
        return Code::empty();
    }

    let branches = node.slot_count(&["IF", "DO"]).max(1);
    let mut code = String::new();
    for i in 0..branches {
        let condition = ctx.value_or(node, &format!("IF{}", i), ORDER_NONE, "False");
        let body = ctx.statement_body(node, &format!("DO{}", i));
        let keyword = if i == 0 { "if" } else { "elif" };
        code.push_str(&format!("{} {}:\n{}", keyword, condition, body));
    }
    if node.statement("ELSE").is_some() {
        let body = ctx.statement_body(node, "ELSE");
        code.push_str(&format!("else:\n{}", body));
    }

    Code::Statement(code)
}

fn controls_repeat(ctx: &mut CodeGen<'_>, node: &Node) -> Code {
    if !ctx.in_allowed_context(node) {
        return Code::empty();
    }

    let times = ctx.value_or(node, "TIMES", ORDER_NONE, "0");
    let body = ctx.statement_body(node, "DO");
    Code::Statement(format!(
        "for count_{} in range({}):\n{}",
        node.symbol_suffix(),
        times,
        body
    ))
}

fn controls_while_until(ctx: &mut CodeGen<'_>, node: &Node) -> Code {
    if !ctx.in_allowed_context(node) {
        return Code::empty();
    }

    let condition = if node.field_or("MODE", "WHILE") == "UNTIL" {
        format!("not {}", ctx.value_or(node, "BOOL", ORDER_LOGICAL_NOT, "False"))
    } else {
        ctx.value_or(node, "BOOL", ORDER_NONE, "False")
    };
    let body = ctx.statement_body(node, "DO");
    Code::Statement(format!("while {}:\n{}", condition, body))
}

fn controls_for(ctx: &mut CodeGen<'_>, node: &Node) -> Code {
    if !ctx.in_allowed_context(node) {
        return Code::empty();
    }

    let var = identifier(node.field_or("VAR", ""), "i");
    ctx.ensure_declared(&format!("var_{}", var), &format!("{} = 0", var));

    let from = ctx.value_or(node, "FROM", ORDER_NONE, "0");
    let to = ctx.value_or(node, "TO", ORDER_ADDITIVE, "0");
    let by = ctx.value_or(node, "BY", ORDER_RELATIONAL, "1");

    // range() excludes its end, so the bound moves one step past `to`.
    let range = match numeric_literal(&by) {
        _ if by == "1" => format!("range({}, {})", from, shifted_bound(&to, 1)),
        Some(n) if n < 0.0 => format!("range({}, {}, {})", from, shifted_bound(&to, -1), by),
        Some(_) => format!("range({}, {}, {})", from, shifted_bound(&to, 1), by),
        None => format!(
            "range({}, {} if {} > 0 else {}, {})",
            from,
            shifted_bound(&to, 1),
            by,
            shifted_bound(&to, -1),
            by
        ),
    };

    let body = ctx.statement_body(node, "DO");
    Code::Statement(format!("for {} in {}:\n{}", var, range, body))
}

/// `bound + delta`, folded when `bound` is an integer literal that stays in
/// range. Python integers do not overflow, so the unfolded text is exact.
fn shifted_bound(bound: &str, delta: i64) -> String {
    match bound.trim().parse::<i64>().ok().and_then(|n| n.checked_add(delta)) {
        Some(n) => n.to_string(),
        None if delta < 0 => format!("{} - {}", bound, delta.unsigned_abs()),
        None => format!("{} + {}", bound, delta),
    }
}

fn controls_flow(ctx: &mut CodeGen<'_>, node: &Node) -> Code {
    if !ctx.in_allowed_context(node) {
        return Code::empty();
    }

    let keyword = match node.field_or("FLOW", "BREAK") {
        "CONTINUE" => "continue",
        _ => "break",
    };
    if ctx.enclosing_within_routine(node, LOOP_TYPES).is_none() {
        log::warn!("'{}' at '{}' is not inside a loop", keyword, node.key());
        return Code::Statement(ctx.comment(&format!("{} outside of a loop", keyword)));
    }

    Code::Statement(ctx.line(keyword))
}

fn procedure_return(ctx: &mut CodeGen<'_>, node: &Node) -> Code {
    if !ctx.in_allowed_context(node) {
        return Code::empty();
    }

    match ctx.value_to_code(node, "VALUE", ORDER_NONE) {
        Some(value) => Code::Statement(ctx.line(&format!("return {}", value))),
        None => Code::Statement(ctx.line("return")),
    }
}

fn time_every(ctx: &mut CodeGen<'_>, node: &Node) -> Code {
    if !ctx.in_allowed_context(node) {
        return Code::empty();
    }

    let state = timer_state(node);
    import_time(ctx);
    ctx.ensure_declared(&state, &format!("{} = 0", state));

    let interval = ctx.value_or(node, "INTERVAL", ORDER_RELATIONAL, "1000");
    let body = ctx.statements_to_code(node, "DO");
    let reset = ctx.indent(&format!("{} = time.ticks_ms()\n", state));

    Code::Statement(format!(
        "if time.ticks_diff(time.ticks_ms(), {}) >= {}:\n{}{}",
        state, interval, reset, body
    ))
}

fn variables_set(ctx: &mut CodeGen<'_>, node: &Node) -> Code {
    let var = identifier(node.field_or("VAR", ""), "item");
    ctx.ensure_declared(&format!("var_{}", var), &format!("{} = 0", var));

    let value = ctx.value_or(node, "VALUE", ORDER_NONE, "0");
    Code::Statement(ctx.line(&format!("{} = {}", var, value)))
}

fn digital_write(ctx: &mut CodeGen<'_>, node: &Node) -> Code {
    let pin = node.field_or("PIN", "2");
    let pin_var = format!("pin_out_{}", suffix(pin));
    import_pin(ctx);
    ctx.ensure_declared(&pin_var, &format!("{} = Pin({}, Pin.OUT)", pin_var, pin));

    let state = ctx.value_or(node, "STATE", ORDER_NONE, "0");
    Code::Statement(ctx.line(&format!("{}.value({})", pin_var, state)))
}

fn analog_write(ctx: &mut CodeGen<'_>, node: &Node) -> Code {
    let pin = node.field_or("PIN", "4");
    let pwm_var = format!("pwm_{}", suffix(pin));
    import_pin(ctx);
    ctx.ensure_declared("import_pwm", "from machine import PWM");
    ctx.ensure_declared(&pwm_var, &format!("{} = PWM(Pin({}))", pwm_var, pin));

    let value = ctx.value_or(node, "NUM", ORDER_NONE, "0");
    Code::Statement(ctx.line(&format!("{}.duty({})", pwm_var, value)))
}

fn serial_print(ctx: &mut CodeGen<'_>, node: &Node) -> Code {
    let content = ctx.value_or(node, "CONTENT", ORDER_NONE, "''");
    let call = if flag(node, "NEWLINE", true) {
        format!("print({})", content)
    } else {
        format!("print({}, end='')", content)
    };
    Code::Statement(ctx.line(&call))
}

fn time_delay(ctx: &mut CodeGen<'_>, node: &Node) -> Code {
    import_time(ctx);
    let ms = ctx.value_or(node, "DELAY_TIME", ORDER_NONE, "1000");
    Code::Statement(ctx.line(&format!("time.sleep_ms({})", ms)))
}

fn servo_write(ctx: &mut CodeGen<'_>, node: &Node) -> Code {
    let name = identifier(node.field_or("NAME", ""), "servo");
    ctx.ensure_declared(
        "servo_angle_fn",
        "def servo_angle(servo, degrees):\n    servo.duty(int(40 + degrees * 75 / 180))",
    );

    let degrees = ctx.value_or(node, "DEGREE", ORDER_NONE, "90");
    Code::Statement(ctx.line(&format!("servo_angle({}, {})", name, degrees)))
}

fn call_no_return(ctx: &mut CodeGen<'_>, node: &Node) -> Code {
    let name = identifier(node.field_or("NAME", ""), "do_something");
    let args = call_arguments(ctx, node, "None").join(", ");
    Code::Statement(ctx.line(&format!("{}({})", name, args)))
}

fn math_number(_ctx: &mut CodeGen<'_>, node: &Node) -> Code {
    let num = node.field_or("NUM", "0").trim();
    let order = if num.starts_with('-') { ORDER_UNARY_SIGN } else { ORDER_ATOMIC };
    Code::Expression(num.to_string(), order)
}

fn math_arithmetic(ctx: &mut CodeGen<'_>, node: &Node) -> Code {
    let (op, order) = match node.field_or("OP", "ADD") {
        "ADD" => ("+", ORDER_ADDITIVE),
        "MINUS" => ("-", ORDER_ADDITIVE),
        "MULTIPLY" => ("*", ORDER_MULTIPLICATIVE),
        "DIVIDE" => ("/", ORDER_MULTIPLICATIVE),
        "POWER" => ("**", ORDER_EXPONENTIATION),
        other => {
            log::warn!("arithmetic operator '{}' on '{}' unknown; using ADD", other, node.key());
            ("+", ORDER_ADDITIVE)
        }
    };

    let a = ctx.value_or(node, "A", order, "0");
    let b = ctx.value_or(node, "B", order, "0");
    Code::Expression(format!("{} {} {}", a, op, b), order)
}

fn logic_boolean(_ctx: &mut CodeGen<'_>, node: &Node) -> Code {
    let value = if flag(node, "BOOL", true) { "True" } else { "False" };
    Code::Expression(value.to_string(), ORDER_ATOMIC)
}

fn logic_compare(ctx: &mut CodeGen<'_>, node: &Node) -> Code {
    let op = match node.field_or("OP", "EQ") {
        "NEQ" => "!=",
        "LT" => "<",
        "LTE" => "<=",
        "GT" => ">",
        "GTE" => ">=",
        _ => "==",
    };

    let a = ctx.value_or(node, "A", ORDER_RELATIONAL, "0");
    let b = ctx.value_or(node, "B", ORDER_RELATIONAL, "0");
    Code::Expression(format!("{} {} {}", a, op, b), ORDER_RELATIONAL)
}

fn logic_operation(ctx: &mut CodeGen<'_>, node: &Node) -> Code {
    let (op, order) = match node.field_or("OP", "AND") {
        "OR" => ("or", ORDER_LOGICAL_OR),
        _ => ("and", ORDER_LOGICAL_AND),
    };

    let a = ctx.value_or(node, "A", order, "False");
    let b = ctx.value_or(node, "B", order, "False");
    Code::Expression(format!("{} {} {}", a, op, b), order)
}

fn logic_negate(ctx: &mut CodeGen<'_>, node: &Node) -> Code {
    let value = ctx.value_or(node, "BOOL", ORDER_LOGICAL_NOT, "True");
    Code::Expression(format!("not {}", value), ORDER_LOGICAL_NOT)
}

fn text(_ctx: &mut CodeGen<'_>, node: &Node) -> Code {
    let raw = node.field("TEXT").unwrap_or_default();
    let escaped = raw
        .replace('\\', "\\\\")
        .replace('\'', "\\'")
        .replace('\n', "\\n");
    Code::Expression(format!("'{}'", escaped), ORDER_ATOMIC)
}

fn variables_get(_ctx: &mut CodeGen<'_>, node: &Node) -> Code {
    Code::Expression(identifier(node.field_or("VAR", ""), "item"), ORDER_ATOMIC)
}

fn digital_read(ctx: &mut CodeGen<'_>, node: &Node) -> Code {
    let pin = node.field_or("PIN", "0");
    let pin_var = format!("pin_in_{}", suffix(pin));
    import_pin(ctx);
    ctx.ensure_declared(&pin_var, &format!("{} = Pin({}, Pin.IN)", pin_var, pin));
    Code::Expression(format!("{}.value()", pin_var), ORDER_FUNCTION_CALL)
}

fn analog_read(ctx: &mut CodeGen<'_>, node: &Node) -> Code {
    let pin = node.field_or("PIN", "34");
    let adc_var = format!("adc_{}", suffix(pin));
    import_pin(ctx);
    ctx.ensure_declared("import_adc", "from machine import ADC");
    ctx.ensure_declared(&adc_var, &format!("{} = ADC(Pin({}))", adc_var, pin));
    Code::Expression(format!("{}.read()", adc_var), ORDER_FUNCTION_CALL)
}

fn time_millis(ctx: &mut CodeGen<'_>, _node: &Node) -> Code {
    import_time(ctx);
    Code::Expression("time.ticks_ms()".to_string(), ORDER_FUNCTION_CALL)
}

fn call_return(ctx: &mut CodeGen<'_>, node: &Node) -> Code {
    let name = identifier(node.field_or("NAME", ""), "do_something");
    let args = call_arguments(ctx, node, "None").join(", ");
    Code::Expression(format!("{}({})", name, args), ORDER_FUNCTION_CALL)
}
