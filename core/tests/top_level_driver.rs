use blockforge_core::backend::{self, BackendId};
use blockforge_core::diagnostics::DiagnosticCode;
use blockforge_core::graph::{GraphBuilder, GraphDocument};
use blockforge_core::{
    CompileError, CompileOptions, Level, compile, compile_document, compile_with_options,
    generate_fragment,
};

#[test]
fn orphaned_root_is_reported_and_legal_root_is_generated() {
    let mut b = GraphBuilder::new();
    let a = b.root("A", "arduino_entry");
    let delay = b.node("A.delay", "time_delay");
    b.set_statement(a, "LOOP", delay);
    b.root("B", "controls_whileUntil");
    let graph = b.build().expect("valid graph");

    let result = compile(&graph, BackendId::Arduino);

    assert!(result.source.contains("void loop() {\n  delay(1000);\n}"), "source:\n{}", result.source);
    assert_eq!(result.diagnostics.len(), 1, "diagnostics: {:?}", result.diagnostics);
    let d = &result.diagnostics[0];
    assert_eq!(d.code, DiagnosticCode::OrphanedTopLevel);
    assert_eq!(d.node_type, "controls_whileUntil");
    assert_eq!(d.node, "B");
    assert_eq!(d.level, Level::Warning);
    assert!(d.message.contains("arduino_entry"), "message should list the legal containers: {}", d.message);
    assert!(!result.source.contains("while ("), "orphaned loop must not be generated");
}

#[test]
fn orphan_does_not_block_siblings_and_order_is_kept() {
    let mut b = GraphBuilder::new();
    let first = b.root("F1", "procedures_defnoreturn");
    b.root("stray", "variables_set");
    let second = b.root("F2", "procedures_defnoreturn");
    b.set_field(first, "NAME", "first");
    b.set_field(second, "NAME", "second");
    let graph = b.build().expect("valid graph");

    let result = compile(&graph, BackendId::Arduino);
    let src = &result.source;

    let first_at = src.find("void first() {").expect("first function emitted");
    let hole_at = src.find("// [ORPHANED_TOP_LEVEL] 'variables_set'").expect("placeholder emitted");
    let second_at = src.find("void second() {").expect("second function emitted");
    assert!(first_at < hole_at && hole_at < second_at, "sections out of order:\n{}", src);
    assert_eq!(result.with_code(DiagnosticCode::OrphanedTopLevel).count(), 1);
}

#[test]
fn container_sets_are_per_backend() {
    let mut b = GraphBuilder::new();
    let entry = b.root("A", "arduino_entry");
    let delay = b.node("D", "time_delay");
    b.set_statement(entry, "LOOP", delay);
    let graph = b.build().expect("valid graph");

    let arduino = compile(&graph, BackendId::Arduino);
    assert!(arduino.is_clean(), "diagnostics: {:?}", arduino.diagnostics);

    let python = compile(&graph, BackendId::MicroPython);
    assert_eq!(python.diagnostics.len(), 1);
    let d = &python.diagnostics[0];
    assert_eq!(d.code, DiagnosticCode::OrphanedTopLevel);
    assert_eq!(d.node_type, "arduino_entry");
    assert!(d.message.contains("micropython_entry"), "message: {}", d.message);
    assert!(python.source.contains("# [ORPHANED_TOP_LEVEL] 'arduino_entry'"), "source:\n{}", python.source);
    assert!(!python.source.contains("sleep_ms"));
}

#[test]
fn missing_generator_is_reported_and_siblings_survive() {
    let mut b = GraphBuilder::new();
    let entry = b.root("A", "arduino_entry");
    let mystery = b.node("M", "mystery_block");
    let write = b.node("W", "io_digitalwrite");
    b.set_body(entry, "LOOP", &[mystery, write]);
    let graph = b.build().expect("valid graph");

    let result = compile(&graph, BackendId::Arduino);

    assert_eq!(result.diagnostics.len(), 1, "diagnostics: {:?}", result.diagnostics);
    assert_eq!(result.diagnostics[0].code, DiagnosticCode::MissingGenerator);
    assert_eq!(result.diagnostics[0].node, "M");
    assert_eq!(result.diagnostics[0].level, Level::Error);
    assert!(result.has_errors());
    assert!(result.source.contains("digitalWrite(13, LOW);"), "source:\n{}", result.source);
}

#[test]
fn custom_backend_without_a_generator_reports_it() {
    let mut custom = backend::select(BackendId::Arduino).clone();
    assert!(custom.generators.remove("time_delay").is_some());

    let mut b = GraphBuilder::new();
    let entry = b.root("A", "arduino_entry");
    let delay = b.node("D", "time_delay");
    b.set_statement(entry, "LOOP", delay);
    let graph = b.build().expect("valid graph");

    let result = compile_with_options(&graph, &custom, &CompileOptions::default());
    assert_eq!(result.with_code(DiagnosticCode::MissingGenerator).count(), 1);
    assert!(result.source.contains("void loop() {\n}"), "source:\n{}", result.source);

    let stock = compile(&graph, BackendId::Arduino);
    assert!(stock.is_clean(), "the built-in backend must be untouched");
}

#[test]
fn always_emitted_blocks_are_found_anywhere() {
    let mut b = GraphBuilder::new();
    b.root("serial", "serial_setup");
    let entry = b.root("A", "arduino_entry");
    let stray = b.root("R", "controls_repeat_ext");
    let servo = b.node("S", "servo_attach");
    b.set_statement(stray, "DO", servo);
    b.set_field(servo, "NAME", "arm");
    let print = b.node("P", "serial_print");
    b.set_statement(entry, "SETUP", print);
    let graph = b.build().expect("valid graph");

    let result = compile(&graph, BackendId::Arduino);
    let src = &result.source;

    assert!(src.contains("void setup() {\n  Serial.begin(9600);\n  arm.attach(9);\n  Serial.println(\"\");\n}"), "source:\n{}", src);
    assert!(src.contains("Servo arm;"));
    assert_eq!(result.diagnostics.len(), 1, "only the stray loop is an orphan: {:?}", result.diagnostics);
    assert_eq!(result.diagnostics[0].node, "R");
}

#[test]
fn setup_lines_from_functions_reach_an_earlier_entry_point() {
    let mut b = GraphBuilder::new();
    b.root("A", "arduino_entry");
    let def = b.root("F", "procedures_defnoreturn");
    let write = b.node("W", "io_digitalwrite");
    b.set_field(def, "NAME", "blink").set_field(write, "PIN", "7");
    b.set_statement(def, "STACK", write);
    let graph = b.build().expect("valid graph");

    let result = compile(&graph, BackendId::Arduino);
    let src = &result.source;

    assert!(src.contains("void setup() {\n  pinMode(7, OUTPUT);\n}"), "source:\n{}", src);
    assert!(src.find("void setup()") < src.find("void blink() {"), "root order must be kept:\n{}", src);
}

#[test]
fn second_entry_point_replays_setup_but_not_declarations() {
    let mut b = GraphBuilder::new();
    b.root("A", "arduino_entry");
    b.root("B", "arduino_entry");
    b.root("S", "servo_attach");
    let graph = b.build().expect("valid graph");

    let result = compile(&graph, BackendId::Arduino);
    assert_eq!(result.source.matches("#include <Servo.h>").count(), 1, "source:\n{}", result.source);
    assert_eq!(result.source.matches("servo.attach(9);").count(), 2, "source:\n{}", result.source);
    assert!(result.is_clean());
}

#[test]
fn options_control_banner_and_placeholders() {
    let mut b = GraphBuilder::new();
    b.root("A", "arduino_entry");
    b.root("B", "time_delay");
    let graph = b.build().expect("valid graph");
    let arduino = backend::select(BackendId::Arduino);

    let full = compile_with_options(&graph, arduino, &CompileOptions::default());
    assert!(full.source.contains("// Generated by blockforge for Arduino"));
    assert!(full.source.contains("[ORPHANED_TOP_LEVEL]"));

    let bare = CompileOptions { banner: false, placeholders: false };
    let quiet = compile_with_options(&graph, arduino, &bare);
    assert!(!quiet.source.contains("Generated by"), "source:\n{}", quiet.source);
    assert!(!quiet.source.contains("[ORPHANED_TOP_LEVEL]"), "source:\n{}", quiet.source);
    assert_eq!(quiet.diagnostics.len(), 1, "placeholders off must still report");
}

#[test]
fn options_default_missing_keys() {
    let opts: CompileOptions = serde_json::from_str(r#"{ "banner": false }"#).expect("parse options");
    assert!(!opts.banner);
    assert!(opts.placeholders);
}

#[test]
fn fragment_of_nested_orphan_reports_it() {
    let mut b = GraphBuilder::new();
    let cond = b.root("X", "controls_if");
    let inner = b.node("Y", "controls_repeat_ext");
    b.set_statement(cond, "DO0", inner);
    let graph = b.build().expect("valid graph");

    let result = generate_fragment(&graph, inner, backend::select(BackendId::Arduino));
    assert_eq!(result.source, "");
    assert_eq!(result.diagnostics.len(), 1);
    assert_eq!(result.diagnostics[0].code, DiagnosticCode::OrphanedNested);
    assert_eq!(result.diagnostics[0].node, "Y");
}

#[test]
fn fragment_of_legal_node_renders_it() {
    let mut b = GraphBuilder::new();
    let entry = b.root("A", "arduino_entry");
    let delay = b.node("D", "time_delay");
    let num = b.node("N", "math_number");
    b.set_field(num, "NUM", "250");
    b.set_value(delay, "DELAY_TIME", num);
    b.set_statement(entry, "LOOP", delay);
    let graph = b.build().expect("valid graph");

    let result = generate_fragment(&graph, delay, backend::select(BackendId::Arduino));
    assert_eq!(result.source, "delay(250);\n");
    assert!(result.is_clean());

    let expr = generate_fragment(&graph, num, backend::select(BackendId::MicroPython));
    assert_eq!(expr.source, "250\n");
}

#[test]
fn blocks_chained_under_an_orphan_are_orphans_too() {
    let mut b = GraphBuilder::new();
    b.root("A", "arduino_entry");
    let cond = b.root("X", "controls_if");
    let delay = b.node("D", "time_delay");
    b.set_next(cond, delay);
    let graph = b.build().expect("valid graph");

    let result = compile(&graph, BackendId::Arduino);
    let orphans: Vec<&str> = result
        .with_code(DiagnosticCode::OrphanedTopLevel)
        .map(|d| d.node.as_str())
        .collect();
    assert_eq!(orphans, vec!["X", "D"]);
    assert!(!result.source.contains("delay("), "source:\n{}", result.source);
    assert!(result.source.contains("// [ORPHANED_TOP_LEVEL] 'time_delay' skipped"), "source:\n{}", result.source);

    let preview = generate_fragment(&graph, cond, backend::select(BackendId::Arduino));
    assert!(!preview.source.contains("delay("), "preview:\n{}", preview.source);
    assert_eq!(preview.source.matches("// [ORPHANED_TOP_LEVEL]").count(), 2, "preview:\n{}", preview.source);
    assert_eq!(preview.diagnostics.len(), 2);
}

#[test]
fn compile_document_rejects_unknown_backend() {
    let doc = GraphDocument::from_json(r#"{ "nodes": [ { "id": "a", "type": "arduino_entry" } ] }"#)
        .expect("parse document");

    match compile_document(doc, "cobol", &CompileOptions::default()) {
        Err(CompileError::UnknownBackend(msg)) => assert!(msg.contains("cobol"), "message: {}", msg),
        other => panic!("expected UnknownBackend, got {:?}", other),
    }
}

#[test]
fn compile_document_rejects_malformed_graph() {
    let doc = GraphDocument::from_json(
        r#"{ "nodes": [ { "id": "a", "type": "arduino_entry", "statements": { "LOOP": "ghost" } } ] }"#,
    )
    .expect("parse document");

    let err = compile_document(doc, "arduino", &CompileOptions::default()).expect_err("dangling link must fail");
    assert!(matches!(err, CompileError::Graph(_)), "got {:?}", err);
    assert!(blockforge_core::generate_error_report(&err).starts_with("BLOCKFORGE | CRITICAL | a |"));
}

#[test]
fn result_serialises_for_hosts() {
    let mut b = GraphBuilder::new();
    b.root("B", "controls_repeat_ext");
    let graph = b.build().expect("valid graph");

    let json = compile(&graph, BackendId::MicroPython).to_json().expect("serialise result");
    let value: serde_json::Value = serde_json::from_str(&json).expect("valid json");
    assert_eq!(value["backend"], "micropython");
    assert_eq!(value["diagnostics"][0]["code"], "ORPHANED_TOP_LEVEL");
    assert_eq!(value["diagnostics"][0]["node_type"], "controls_repeat_ext");
}
