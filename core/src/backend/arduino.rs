//! file: core/src/backend/arduino.rs
//! description: C-like sketch backend for classic microcontroller boards.
//!
//! Produces a `setup()`/`loop()` sketch. One-time fragments (includes,
//! globals, function prototypes, timer state) go to the declaration
//! collector; pin modes, serial start and attach calls go to the setup
//! collector and are replayed at the top of `setup()`.

use crate::codegen::{Code, CodeGen, ORDER_ATOMIC, ORDER_NONE, Order};
use crate::graph::Node;

use super::{
    Backend, Formatting, LOOP_TYPES, TypeSet, call_arguments, flag, identifier, numeric_literal,
    parameters,
};

// C operator precedence, tightest first.
pub const ORDER_UNARY_POSTFIX: Order = 1; // expr++ expr-- () [] .
pub const ORDER_UNARY_PREFIX: Order = 2; // -expr !expr ~expr ++expr --expr
pub const ORDER_MULTIPLICATIVE: Order = 3;
pub const ORDER_ADDITIVE: Order = 4;
pub const ORDER_SHIFT: Order = 5;
pub const ORDER_RELATIONAL: Order = 6;
pub const ORDER_EQUALITY: Order = 7;
pub const ORDER_BITWISE_AND: Order = 8;
pub const ORDER_BITWISE_XOR: Order = 9;
pub const ORDER_BITWISE_OR: Order = 10;
pub const ORDER_LOGICAL_AND: Order = 11;
pub const ORDER_LOGICAL_OR: Order = 12;
pub const ORDER_CONDITIONAL: Order = 13;
pub const ORDER_ASSIGNMENT: Order = 14;

pub const ENTRY_POINT: &str = "arduino_entry";

pub(crate) fn backend() -> Backend {
    let mut backend = Backend::new(
        "arduino",
        "Arduino",
        Formatting {
            statement_separator: ";",
            comment_prefix: "//",
            indent: "  ",
            empty_body: None,
            entry_points_last: false,
        },
    );

    backend.containers = TypeSet::new(&[ENTRY_POINT, "procedures_defnoreturn", "procedures_defreturn"]);
    backend.entry_points = TypeSet::new(&[ENTRY_POINT]);
    backend.always_emitted = TypeSet::new(&["serial_setup", "servo_attach", "interrupt_attach"]);

    backend
        .generators
        // containers
        .register(ENTRY_POINT, entry)
        .register("procedures_defnoreturn", procedure)
        .register("procedures_defreturn", procedure)
        // always emitted
        .register("serial_setup", serial_setup)
        .register("servo_attach", servo_attach)
        .register("interrupt_attach", interrupt_attach)
        // guarded statements
        .register("controls_if", controls_if)
        .register("controls_repeat_ext", controls_repeat)
        .register("controls_whileUntil", controls_while_until)
        .register("controls_for", controls_for)
        .register("controls_flow_statements", controls_flow)
        .register("procedures_return", procedure_return)
        .register("time_every", time_every)
        // statements
        .register("variables_set", variables_set)
        .register("io_digitalwrite", digital_write)
        .register("io_analogwrite", analog_write)
        .register("serial_print", serial_print)
        .register("time_delay", time_delay)
        .register("servo_write", servo_write)
        .register("procedures_callnoreturn", call_no_return)
        // expressions
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

fn entry(ctx: &mut CodeGen<'_>, node: &Node) -> Code {
    ctx.note_entry_point(node);
    ctx.run_always_emitted_pass();

    let setup_body = ctx.statements_to_code(node, "SETUP");
    let loop_body = ctx.statements_to_code(node, "LOOP");
    let setup_lines = ctx.indent(&ctx.setups().flush());

    Code::Statement(format!(
        "void setup() {{\n{}{}}}\n\nvoid loop() {{\n{}}}\n",
        setup_lines, setup_body, loop_body
    ))
}

fn procedure(ctx: &mut CodeGen<'_>, node: &Node) -> Code {
    let name = identifier(node.field_or("NAME", ""), "do_something");
    let returns = node.node_type() == "procedures_defreturn";
    let return_type = if returns { node.field_or("TYPE", "long") } else { "void" };

    let params = parameters(node)
        .iter()
        .map(|p| format!("long {}", p))
        .collect::<Vec<_>>()
        .join(", ");
    let signature = format!("{} {}({})", return_type, name, params);
    ctx.ensure_declared(&format!("proto_{}", name), &format!("{};", signature));

    let mut body = ctx.statements_to_code(node, "STACK");
    if returns {
        if let Some(value) = ctx.value_to_code(node, "RETURN", ORDER_NONE) {
            let line = ctx.line(&format!("return {}", value));
            body.push_str(&ctx.indent(&line));
        }
    }

    Code::Statement(format!("{} {{\n{}}}\n", signature, body))
}

fn serial_setup(ctx: &mut CodeGen<'_>, node: &Node) -> Code {
    let baud = node.field_or("BAUD", "9600");
    ctx.ensure_setup("serial_begin", &format!("Serial.begin({});", baud));
    Code::empty()
}

fn servo_attach(ctx: &mut CodeGen<'_>, node: &Node) -> Code {
    let name = identifier(node.field_or("NAME", ""), "servo");
    let pin = node.field_or("PIN", "9");
    ctx.ensure_declared("include_servo", "#include <Servo.h>");
    ctx.ensure_declared(&format!("servo_{}", name), &format!("Servo {};", name));
    ctx.ensure_setup(
        &format!("servo_attach_{}", name),
        &format!("{}.attach({});", name, pin),
    );
    Code::empty()
}

fn interrupt_attach(ctx: &mut CodeGen<'_>, node: &Node) -> Code {
    let pin = node.field_or("PIN", "2");
    let mode = match node.field_or("MODE", "RISING") {
        m @ ("RISING" | "FALLING" | "CHANGE" | "LOW") => m,
        other => {
            log::warn!("interrupt mode '{}' on '{}' unknown; using RISING", other, node.key());
            "RISING"
        }
    };
    let handler = identifier(node.field_or("HANDLER", ""), "on_interrupt");

    ctx.ensure_declared(&format!("proto_{}", handler), &format!("void {}();", handler));
    ctx.ensure_setup(
        &format!("interrupt_{}", pin),
        &format!(
            "attachInterrupt(digitalPinToInterrupt({}), {}, {});",
            pin, handler, mode
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
        let condition = ctx.value_or(node, &format!("IF{}", i), ORDER_NONE, "false");
        let body = ctx.statements_to_code(node, &format!("DO{}", i));
        let keyword = if i == 0 { "if" } else { " else if" };
        code.push_str(&format!("{} ({}) {{\n{}}}", keyword, condition, body));
    }
    if node.statement("ELSE").is_some() {
        let body = ctx.statements_to_code(node, "ELSE");
        code.push_str(&format!(" else {{\n{}}}", body));
    }
    code.push('\n');

    Code::Statement(code)
}

fn controls_repeat(ctx: &mut CodeGen<'_>, node: &Node) -> Code {
    if !ctx.in_allowed_context(node) {
        return Code::empty();
    }

    let times = ctx.value_or(node, "TIMES", ORDER_RELATIONAL, "0");
    let counter = format!("count_{}", node.symbol_suffix());
    let body = ctx.statements_to_code(node, "DO");

    Code::Statement(format!(
        "for (int {c} = 0; {c} < {t}; {c}++) {{\n{b}}}\n",
        c = counter,
        t = times,
        b = body
    ))
}

fn controls_while_until(ctx: &mut CodeGen<'_>, node: &Node) -> Code {
    if !ctx.in_allowed_context(node) {
        return Code::empty();
    }

    let until = node.field_or("MODE", "WHILE") == "UNTIL";
    let condition = if until {
        format!("!{}", ctx.value_or(node, "BOOL", ORDER_UNARY_PREFIX, "false"))
    } else {
        ctx.value_or(node, "BOOL", ORDER_NONE, "false")
    };
    let body = ctx.statements_to_code(node, "DO");

    Code::Statement(format!("while ({}) {{\n{}}}\n", condition, body))
}

fn controls_for(ctx: &mut CodeGen<'_>, node: &Node) -> Code {
    if !ctx.in_allowed_context(node) {
        return Code::empty();
    }

    let var = identifier(node.field_or("VAR", ""), "i");
    ctx.ensure_declared(&format!("var_{}", var), &format!("long {} = 0;", var));

    let from = ctx.value_or(node, "FROM", ORDER_ASSIGNMENT, "0");
    let to = ctx.value_or(node, "TO", ORDER_RELATIONAL, "0");
    let by = ctx.value_or(node, "BY", ORDER_RELATIONAL, "1");
    let body = ctx.statements_to_code(node, "DO");

    // A literal step fixes the direction; anything else is tested at run time.
    let (condition, step) = match numeric_literal(&by) {
        Some(n) if n < 0.0 => (
            format!("{} >= {}", var, to),
            format!("{} -= {}", var, by.trim().trim_start_matches('-')),
        ),
        Some(_) => (format!("{} <= {}", var, to), format!("{} += {}", var, by)),
        None => (
            format!("{b} >= 0 ? {v} <= {t} : {v} >= {t}", b = by, v = var, t = to),
            format!("{} += {}", var, by),
        ),
    };

    Code::Statement(format!(
        "for ({} = {}; {}; {}) {{\n{}}}\n",
        var, from, condition, step, body
    ))
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

    let state = format!("every_{}_last", node.symbol_suffix());
    ctx.ensure_declared(&state, &format!("unsigned long {} = 0;", state));

    let interval = ctx.value_or(node, "INTERVAL", ORDER_RELATIONAL, "1000");
    let body = ctx.statements_to_code(node, "DO");
    let reset = ctx.line(&format!("{} = millis()", state));

    Code::Statement(format!(
        "if (millis() - {} >= {}) {{\n{}{}}}\n",
        state,
        interval,
        ctx.indent(&reset),
        body
    ))
}

fn variables_set(ctx: &mut CodeGen<'_>, node: &Node) -> Code {
    let var = identifier(node.field_or("VAR", ""), "item");
    let ty = node.field_or("TYPE", "long");
    ctx.ensure_declared(&format!("var_{}", var), &format!("{} {} = 0;", ty, var));

    let value = ctx.value_or(node, "VALUE", ORDER_ASSIGNMENT, "0");
    Code::Statement(ctx.line(&format!("{} = {}", var, value)))
}

fn digital_write(ctx: &mut CodeGen<'_>, node: &Node) -> Code {
    let pin = node.field_or("PIN", "13");
    pin_mode(ctx, pin, "OUTPUT");

    let state = ctx.value_or(node, "STATE", ORDER_NONE, "LOW");
    Code::Statement(ctx.line(&format!("digitalWrite({}, {})", pin, state)))
}

fn analog_write(ctx: &mut CodeGen<'_>, node: &Node) -> Code {
    let pin = node.field_or("PIN", "3");
    pin_mode(ctx, pin, "OUTPUT");

    let value = ctx.value_or(node, "NUM", ORDER_NONE, "0");
    Code::Statement(ctx.line(&format!("analogWrite({}, {})", pin, value)))
}

fn serial_print(ctx: &mut CodeGen<'_>, node: &Node) -> Code {
    let content = ctx.value_or(node, "CONTENT", ORDER_NONE, "\"\"");
    let call = if flag(node, "NEWLINE", true) { "println" } else { "print" };
    Code::Statement(ctx.line(&format!("Serial.{}({})", call, content)))
}

fn time_delay(ctx: &mut CodeGen<'_>, node: &Node) -> Code {
    let ms = ctx.value_or(node, "DELAY_TIME", ORDER_NONE, "1000");
    Code::Statement(ctx.line(&format!("delay({})", ms)))
}

fn servo_write(ctx: &mut CodeGen<'_>, node: &Node) -> Code {
    let name = identifier(node.field_or("NAME", ""), "servo");
    let degrees = ctx.value_or(node, "DEGREE", ORDER_NONE, "90");
    Code::Statement(ctx.line(&format!("{}.write({})", name, degrees)))
}

fn call_no_return(ctx: &mut CodeGen<'_>, node: &Node) -> Code {
    let name = identifier(node.field_or("NAME", ""), "do_something");
    let args = call_arguments(ctx, node, "0").join(", ");
    Code::Statement(ctx.line(&format!("{}({})", name, args)))
}

fn math_number(_ctx: &mut CodeGen<'_>, node: &Node) -> Code {
    let num = node.field_or("NUM", "0").trim();
    let order = if num.starts_with('-') { ORDER_UNARY_PREFIX } else { ORDER_ATOMIC };
    Code::Expression(num.to_string(), order)
}

fn math_arithmetic(ctx: &mut CodeGen<'_>, node: &Node) -> Code {
    let (op, order) = match node.field_or("OP", "ADD") {
        "ADD" => ("+", ORDER_ADDITIVE),
        "MINUS" => ("-", ORDER_ADDITIVE),
        "MULTIPLY" => ("*", ORDER_MULTIPLICATIVE),
        "DIVIDE" => ("/", ORDER_MULTIPLICATIVE),
        "POWER" => {
            let a = ctx.value_or(node, "A", ORDER_NONE, "0");
            let b = ctx.value_or(node, "B", ORDER_NONE, "0");
            return Code::Expression(format!("pow({}, {})", a, b), ORDER_UNARY_POSTFIX);
        }
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
    let value = if flag(node, "BOOL", true) { "true" } else { "false" };
    Code::Expression(value.to_string(), ORDER_ATOMIC)
}

fn logic_compare(ctx: &mut CodeGen<'_>, node: &Node) -> Code {
    let (op, order) = match node.field_or("OP", "EQ") {
        "NEQ" => ("!=", ORDER_EQUALITY),
        "LT" => ("<", ORDER_RELATIONAL),
        "LTE" => ("<=", ORDER_RELATIONAL),
        "GT" => (">", ORDER_RELATIONAL),
        "GTE" => (">=", ORDER_RELATIONAL),
        _ => ("==", ORDER_EQUALITY),
    };

    let a = ctx.value_or(node, "A", order, "0");
    let b = ctx.value_or(node, "B", order, "0");
    Code::Expression(format!("{} {} {}", a, op, b), order)
}

fn logic_operation(ctx: &mut CodeGen<'_>, node: &Node) -> Code {
    let (op, order) = match node.field_or("OP", "AND") {
        "OR" => ("||", ORDER_LOGICAL_OR),
        _ => ("&&", ORDER_LOGICAL_AND),
    };

    let a = ctx.value_or(node, "A", order, "false");
    let b = ctx.value_or(node, "B", order, "false");
    Code::Expression(format!("{} {} {}", a, op, b), order)
}

fn logic_negate(ctx: &mut CodeGen<'_>, node: &Node) -> Code {
    let value = ctx.value_or(node, "BOOL", ORDER_UNARY_PREFIX, "true");
    Code::Expression(format!("!{}", value), ORDER_UNARY_PREFIX)
}

fn text(_ctx: &mut CodeGen<'_>, node: &Node) -> Code {
    let raw = node.field("TEXT").unwrap_or_default();
    let escaped = raw
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n");
    Code::Expression(format!("\"{}\"", escaped), ORDER_ATOMIC)
}

fn variables_get(_ctx: &mut CodeGen<'_>, node: &Node) -> Code {
    Code::Expression(identifier(node.field_or("VAR", ""), "item"), ORDER_ATOMIC)
}

fn digital_read(ctx: &mut CodeGen<'_>, node: &Node) -> Code {
    let pin = node.field_or("PIN", "2");
    pin_mode(ctx, pin, "INPUT");
    Code::Expression(format!("digitalRead({})", pin), ORDER_UNARY_POSTFIX)
}

/// Registers the `pinMode` setup line for one direction of a pin. Both
/// directions are kept, in first-use order, so the last one wins on the board.
fn pin_mode(ctx: &mut CodeGen<'_>, pin: &str, mode: &str) {
    let other = if mode == "INPUT" { "OUTPUT" } else { "INPUT" };
    let added = ctx.ensure_setup(&format!("pin_mode_{}_{}", pin, mode), &format!("pinMode({}, {});", pin, mode));
    if added && ctx.setups().contains(&format!("pin_mode_{}_{}", pin, other)) {
        log::warn!("pin {} is used as both INPUT and OUTPUT; both pinMode calls are emitted", pin);
    }
}

fn analog_read(_ctx: &mut CodeGen<'_>, node: &Node) -> Code {
    let pin = node.field_or("PIN", "A0");
    Code::Expression(format!("analogRead({})", pin), ORDER_UNARY_POSTFIX)
}

fn time_millis(_ctx: &mut CodeGen<'_>, _node: &Node) -> Code {
    Code::Expression("millis()".to_string(), ORDER_UNARY_POSTFIX)
}

fn call_return(ctx: &mut CodeGen<'_>, node: &Node) -> Code {
    let name = identifier(node.field_or("NAME", ""), "do_something");
    let args = call_arguments(ctx, node, "0").join(", ");
    Code::Expression(format!("{}({})", name, args), ORDER_UNARY_POSTFIX)
}
