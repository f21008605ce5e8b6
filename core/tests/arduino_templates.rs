use blockforge_core::backend::BackendId;
use blockforge_core::graph::{GraphBuilder, NodeId};
use blockforge_core::compile;

fn number(b: &mut GraphBuilder, key: &str, value: &str) -> NodeId {
    let id = b.node(key, "math_number");
    b.set_field(id, "NUM", value);
    id
}

fn var(b: &mut GraphBuilder, key: &str, name: &str) -> NodeId {
    let id = b.node(key, "variables_get");
    b.set_field(id, "VAR", name);
    id
}

fn text(b: &mut GraphBuilder, key: &str, value: &str) -> NodeId {
    let id = b.node(key, "text");
    b.set_field(id, "TEXT", value);
    id
}

fn binary(b: &mut GraphBuilder, key: &str, ty: &str, op: &str, lhs: NodeId, rhs: NodeId) -> NodeId {
    let id = b.node(key, ty);
    b.set_field(id, "OP", op).set_value(id, "A", lhs).set_value(id, "B", rhs);
    id
}

#[test]
fn blink_sketch() {
    let mut b = GraphBuilder::new();
    let entry = b.root("entry", "arduino_entry");
    let on = b.node("on", "io_digitalwrite");
    let high = b.node("high", "logic_boolean");
    let wait = b.node("wait", "time_delay");
    let ms = number(&mut b, "ms", "500");
    let off = b.node("off", "io_digitalwrite");
    let wait_again = b.node("wait2", "time_delay");
    b.set_field(on, "PIN", "13").set_field(high, "BOOL", "TRUE").set_value(on, "STATE", high);
    b.set_value(wait, "DELAY_TIME", ms);
    b.set_field(off, "PIN", "13");
    b.set_body(entry, "LOOP", &[on, wait, off, wait_again]);
    let graph = b.build().expect("valid graph");

    let result = compile(&graph, BackendId::Arduino);

    let expected = "\
// Generated by blockforge for Arduino

void setup() {
  pinMode(13, OUTPUT);
}

void loop() {
  digitalWrite(13, true);
  delay(500);
  digitalWrite(13, LOW);
  delay(1000);
}
";
    assert_eq!(result.source, expected);
    assert!(result.is_clean());
}

#[test]
fn functions_get_prototypes_and_returns() {
    let mut b = GraphBuilder::new();
    let def = b.root("F", "procedures_defreturn");
    let entry = b.root("A", "arduino_entry");
    let a = var(&mut b, "a", "a");
    let bb = var(&mut b, "b", "b");
    let sum = binary(&mut b, "sum", "math_arithmetic", "ADD", a, bb);
    b.set_field(def, "NAME", "add").set_field(def, "PARAMS", "a, b").set_value(def, "RETURN", sum);

    let set = b.node("set", "variables_set");
    let call = b.node("call", "procedures_callreturn");
    let one = number(&mut b, "one", "1");
    let two = number(&mut b, "two", "2");
    b.set_field(call, "NAME", "add").set_value(call, "ARG0", one).set_value(call, "ARG1", two);
    b.set_field(set, "VAR", "total").set_value(set, "VALUE", call);
    b.set_statement(entry, "SETUP", set);
    let graph = b.build().expect("valid graph");

    let result = compile(&graph, BackendId::Arduino);

    let expected = "\
long add(long a, long b);
long total = 0;

// Generated by blockforge for Arduino

long add(long a, long b) {
  return a + b;
}

void setup() {
  total = add(1, 2);
}

void loop() {
}
";
    assert_eq!(result.source, expected);
}

#[test]
fn early_return_inside_function() {
    let mut b = GraphBuilder::new();
    let def = b.root("F", "procedures_defnoreturn");
    let ret = b.node("ret", "procedures_return");
    let call = b.node("call", "procedures_callnoreturn");
    b.set_field(def, "NAME", "stop");
    b.set_body(def, "STACK", &[call, ret]);
    b.set_field(call, "NAME", "halt motors");
    let graph = b.build().expect("valid graph");

    let result = compile(&graph, BackendId::Arduino);
    assert!(result.source.contains("void stop() {\n  halt_motors();\n  return;\n}\n"), "source:\n{}", result.source);
}

#[test]
fn operators_are_parenthesised_by_precedence() {
    let mut b = GraphBuilder::new();
    let entry = b.root("entry", "arduino_entry");

    let one = number(&mut b, "n1", "1");
    let two = number(&mut b, "n2", "2");
    let three = number(&mut b, "n3", "3");
    let sum = binary(&mut b, "sum", "math_arithmetic", "ADD", one, two);
    let product = binary(&mut b, "product", "math_arithmetic", "MULTIPLY", sum, three);
    let set_x = b.node("set_x", "variables_set");
    b.set_field(set_x, "VAR", "x").set_value(set_x, "VALUE", product);

    let base = number(&mut b, "n4", "2");
    let exp = number(&mut b, "n5", "8");
    let power = binary(&mut b, "power", "math_arithmetic", "POWER", base, exp);
    let set_y = b.node("set_y", "variables_set");
    b.set_field(set_y, "VAR", "y").set_value(set_y, "VALUE", power);

    let ten = number(&mut b, "n6", "10");
    let four = number(&mut b, "n7", "4");
    let unit = number(&mut b, "n8", "1");
    let inner = binary(&mut b, "inner", "math_arithmetic", "MINUS", four, unit);
    let outer = binary(&mut b, "outer", "math_arithmetic", "MINUS", ten, inner);
    let set_z = b.node("set_z", "variables_set");
    b.set_field(set_z, "VAR", "z").set_field(set_z, "TYPE", "int").set_value(set_z, "VALUE", outer);

    let x = var(&mut b, "get_x", "x");
    let zero = number(&mut b, "n9", "0");
    let less = binary(&mut b, "less", "logic_compare", "LT", x, zero);
    let not = b.node("not", "logic_negate");
    b.set_value(not, "BOOL", less);
    let set_flag = b.node("set_flag", "variables_set");
    b.set_field(set_flag, "VAR", "flag").set_field(set_flag, "TYPE", "bool").set_value(set_flag, "VALUE", not);

    let quoted = text(&mut b, "quote", "say \"hi\"");
    let print = b.node("print", "serial_print");
    b.set_value(print, "CONTENT", quoted);

    b.set_body(entry, "SETUP", &[set_x, set_y, set_z, set_flag, print]);
    let graph = b.build().expect("valid graph");

    let src = compile(&graph, BackendId::Arduino).source;
    for line in [
        "  x = (1 + 2) * 3;\n",
        "  y = pow(2, 8);\n",
        "  z = 10 - (4 - 1);\n",
        "  flag = !(x < 0);\n",
        "  Serial.println(\"say \\\"hi\\\"\");\n",
        "long x = 0;\n",
        "int z = 0;\n",
        "bool flag = 0;\n",
    ] {
        assert!(src.contains(line), "missing {:?} in:\n{}", line, src);
    }
}

#[test]
fn conditional_with_else_if_and_else() {
    let mut b = GraphBuilder::new();
    let entry = b.root("entry", "arduino_entry");
    let cond = b.node("if", "controls_if");

    let x = var(&mut b, "x", "x");
    let ten = number(&mut b, "ten", "10");
    let greater = binary(&mut b, "gt", "logic_compare", "GT", x, ten);
    let never = b.node("never", "logic_boolean");
    b.set_field(never, "BOOL", "FALSE");

    let big = text(&mut b, "big", "big");
    let small = text(&mut b, "small", "small");
    let say_big = b.node("say_big", "serial_print");
    let say_small = b.node("say_small", "serial_print");
    b.set_value(say_big, "CONTENT", big);
    b.set_value(say_small, "CONTENT", small).set_field(say_small, "NEWLINE", "FALSE");

    b.set_value(cond, "IF0", greater).set_statement(cond, "DO0", say_big);
    b.set_value(cond, "IF1", never);
    b.set_statement(cond, "ELSE", say_small);
    b.set_statement(entry, "LOOP", cond);
    let graph = b.build().expect("valid graph");

    let src = compile(&graph, BackendId::Arduino).source;
    let expected = "\
void loop() {
  if (x > 10) {
    Serial.println(\"big\");
  } else if (false) {
  } else {
    Serial.print(\"small\");
  }
}
";
    assert!(src.contains(expected), "source:\n{}", src);
}

#[test]
fn loops_and_flow_statements() {
    let mut b = GraphBuilder::new();
    let entry = b.root("entry", "arduino_entry");

    let repeat = b.node("R", "controls_repeat_ext");
    let three = number(&mut b, "three", "3");
    let brk = b.node("K", "controls_flow_statements");
    b.set_value(repeat, "TIMES", three).set_statement(repeat, "DO", brk);
    b.set_field(brk, "FLOW", "BREAK");

    let until = b.node("W", "controls_whileUntil");
    let button = b.node("button", "io_digitalread");
    b.set_field(button, "PIN", "4");
    b.set_field(until, "MODE", "UNTIL").set_value(until, "BOOL", button);

    let count = b.node("C", "controls_for");
    let from = number(&mut b, "from", "1");
    let to = number(&mut b, "to", "10");
    let skip = b.node("skip", "controls_flow_statements");
    b.set_field(count, "VAR", "i").set_value(count, "FROM", from).set_value(count, "TO", to);
    b.set_field(skip, "FLOW", "CONTINUE");
    b.set_statement(count, "DO", skip);

    let stray = b.node("stray", "controls_flow_statements");
    b.set_body(entry, "LOOP", &[repeat, until, count, stray]);
    let graph = b.build().expect("valid graph");

    let result = compile(&graph, BackendId::Arduino);
    let src = &result.source;
    for fragment in [
        "  for (int count_R = 0; count_R < 3; count_R++) {\n    break;\n  }\n",
        "  while (!digitalRead(4)) {\n  }\n",
        "  for (i = 1; i <= 10; i += 1) {\n    continue;\n  }\n",
        "  // break outside of a loop\n",
        "  pinMode(4, INPUT);\n",
        "long i = 0;\n",
    ] {
        assert!(src.contains(fragment), "missing {:?} in:\n{}", fragment, src);
    }
    assert!(result.is_clean(), "diagnostics: {:?}", result.diagnostics);
}

#[test]
fn timed_repeat_keeps_its_own_state() {
    let mut b = GraphBuilder::new();
    let entry = b.root("entry", "arduino_entry");
    let every = b.node("T1", "time_every");
    let interval = number(&mut b, "interval", "250");
    let tick = text(&mut b, "tick", "tick");
    let print = b.node("print", "serial_print");
    b.set_value(print, "CONTENT", tick);
    b.set_value(every, "INTERVAL", interval).set_statement(every, "DO", print);
    b.set_statement(entry, "LOOP", every);
    let graph = b.build().expect("valid graph");

    let src = compile(&graph, BackendId::Arduino).source;
    assert!(src.starts_with("unsigned long every_T1_last = 0;\n"), "source:\n{}", src);
    let expected = "  if (millis() - every_T1_last >= 250) {\n    every_T1_last = millis();\n    Serial.println(\"tick\");\n  }\n";
    assert!(src.contains(expected), "source:\n{}", src);
}

#[test]
fn interrupt_handler_shares_the_function_prototype() {
    let mut b = GraphBuilder::new();
    let irq = b.root("irq", "interrupt_attach");
    let def = b.root("handler", "procedures_defnoreturn");
    b.root("entry", "arduino_entry");
    b.set_field(irq, "PIN", "2").set_field(irq, "MODE", "FALLING").set_field(irq, "HANDLER", "on_press");

    let set = b.node("set", "variables_set");
    let yes = b.node("yes", "logic_boolean");
    b.set_field(set, "VAR", "pressed").set_field(set, "TYPE", "bool").set_value(set, "VALUE", yes);
    b.set_field(def, "NAME", "on_press").set_statement(def, "STACK", set);
    let graph = b.build().expect("valid graph");

    let result = compile(&graph, BackendId::Arduino);
    let src = &result.source;

    assert!(src.starts_with("void on_press();\nbool pressed = 0;\n"), "source:\n{}", src);
    assert_eq!(src.matches("void on_press();").count(), 1);
    assert!(src.contains("void setup() {\n  attachInterrupt(digitalPinToInterrupt(2), on_press, FALLING);\n}"), "source:\n{}", src);
    assert!(src.contains("void on_press() {\n  pressed = true;\n}"), "source:\n{}", src);
    assert!(result.is_clean());
}

#[test]
fn guarded_blocks_in_orphaned_function_body_are_still_generated() {
    // a function is a container, so its loops are legal even without an entry point
    let mut b = GraphBuilder::new();
    let def = b.root("F", "procedures_defnoreturn");
    let repeat = b.node("R", "controls_repeat_ext");
    b.set_field(def, "NAME", "spin").set_statement(def, "STACK", repeat);
    let graph = b.build().expect("valid graph");

    let result = compile(&graph, BackendId::Arduino);
    assert!(result.source.contains("for (int count_R = 0; count_R < 0; count_R++)"), "source:\n{}", result.source);
    assert!(result.is_clean());
}

fn counting_loop(b: &mut GraphBuilder, from: &str, to: &str, by: NodeId) -> NodeId {
    let count = b.node("C", "controls_for");
    let from = number(b, "from", from);
    let to = number(b, "to", to);
    b.set_field(count, "VAR", "i").set_value(count, "FROM", from).set_value(count, "TO", to);
    b.set_value(count, "BY", by);
    count
}

#[test]
fn negative_step_counts_down() {
    let mut b = GraphBuilder::new();
    let entry = b.root("entry", "arduino_entry");
    let by = number(&mut b, "by", "-1");
    let count = counting_loop(&mut b, "10", "1", by);
    b.set_statement(entry, "LOOP", count);
    let graph = b.build().expect("valid graph");

    let src = compile(&graph, BackendId::Arduino).source;
    assert!(src.contains("  for (i = 10; i >= 1; i -= 1) {\n  }\n"), "source:\n{}", src);
}

#[test]
fn variable_step_picks_direction_at_run_time() {
    let mut b = GraphBuilder::new();
    let entry = b.root("entry", "arduino_entry");
    let by = var(&mut b, "by", "step");
    let count = counting_loop(&mut b, "0", "10", by);
    b.set_statement(entry, "LOOP", count);
    let graph = b.build().expect("valid graph");

    let src = compile(&graph, BackendId::Arduino).source;
    assert!(
        src.contains("  for (i = 0; step >= 0 ? i <= 10 : i >= 10; i += step) {\n"),
        "source:\n{}",
        src
    );
}

#[test]
fn pin_read_then_written_keeps_both_modes() {
    let mut b = GraphBuilder::new();
    let entry = b.root("entry", "arduino_entry");
    let read = b.node("read", "io_digitalread");
    let save = b.node("save", "variables_set");
    let write = b.node("write", "io_digitalwrite");
    b.set_field(read, "PIN", "7");
    b.set_field(save, "VAR", "level").set_value(save, "VALUE", read);
    b.set_field(write, "PIN", "7");
    b.set_body(entry, "LOOP", &[save, write]);
    let graph = b.build().expect("valid graph");

    let src = compile(&graph, BackendId::Arduino).source;
    assert!(
        src.contains("void setup() {\n  pinMode(7, INPUT);\n  pinMode(7, OUTPUT);\n}"),
        "source:\n{}",
        src
    );
}
