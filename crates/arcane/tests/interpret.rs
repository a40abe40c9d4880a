use arcane::{Interpretation, Interpreter, Level, Node, Preferences, interpret, snapshot};
use serde_json::{Value as Json, json};

fn id(name: &str) -> Json {
    json!({"type": "identifier", "value": name})
}

fn int(value: i64) -> Json {
    json!({"type": "integerLiteral", "value": value})
}

fn string(value: &str) -> Json {
    json!({"type": "stringLiteral", "segments": [{"type": "stringSegment", "value": value}]})
}

/// Expressions sequence from alternating operands and infix operators.
fn seq(values: &[Json]) -> Json {
    let values: Vec<Json> = values
        .iter()
        .map(|value| match value.as_str() {
            Some(operator) => json!({"type": "infixOperator", "value": operator}),
            None => value.clone(),
        })
        .collect();
    json!({"type": "expressionsSequence", "values": values})
}

fn var(name: &str, value: Json) -> Json {
    json!({
        "type": "variableDeclaration",
        "declarators": [{"type": "declarator", "identifier": id(name), "value": value}]
    })
}

fn call(callee: Json, arguments: &[Json]) -> Json {
    let arguments: Vec<Json> = arguments
        .iter()
        .map(|value| json!({"type": "argument", "value": value}))
        .collect();
    json!({"type": "callExpression", "callee": callee, "arguments": arguments})
}

fn print(value: Json) -> Json {
    call(id("print"), &[value])
}

fn chain(composite: Json, member: &str) -> Json {
    json!({"type": "chainExpression", "composite": composite, "member": id(member)})
}

fn body(statements: &[Json]) -> Json {
    json!({"type": "functionBody", "statements": statements})
}

fn function(name: &str, parameters: &[&str], statements: &[Json]) -> Json {
    let parameters: Vec<Json> = parameters
        .iter()
        .map(|name| json!({"type": "parameter", "identifier": id(name)}))
        .collect();
    json!({
        "type": "functionDeclaration",
        "identifier": id(name),
        "signature": {"type": "functionSignature", "parameters": parameters},
        "body": body(statements)
    })
}

fn module(statements: &[Json]) -> Node {
    serde_json::from_value(json!({"type": "module", "statements": statements})).unwrap()
}

fn run_with(statements: &[Json], preferences: Preferences) -> Interpretation {
    interpret(Vec::new(), &module(statements), None, preferences)
}

fn run(statements: &[Json]) -> Interpretation {
    run_with(statements, Preferences::default())
}

fn output(interpretation: &Interpretation) -> Vec<&str> {
    interpretation
        .reports
        .iter()
        .filter(|report| report.level == Level::Info)
        .map(|report| report.string.as_str())
        .collect()
}

fn diagnostics(interpretation: &Interpretation, level: Level) -> Vec<&str> {
    interpretation
        .reports
        .iter()
        .filter(|report| report.level == level)
        .map(|report| report.string.as_str())
        .collect()
}

fn alive(interpretation: &Interpretation, title: &str) -> bool {
    interpretation
        .composites
        .iter()
        .any(|(_, composite)| composite.title.as_deref() == Some(title))
}

#[test]
fn namespace_members_are_visible_from_child_scopes() {
    let interpretation = run(&[
        var("x", int(5)),
        function("f", &[], &[json!({"type": "returnStatement", "value": id("x")})]),
        print(call(id("f"), &[])),
        json!({"type": "deleteExpression", "value": id("x")}),
        print(id("x")),
    ]);

    assert_eq!(output(&interpretation), ["5", "nil"]);
    assert_eq!(
        diagnostics(&interpretation, Level::Warning),
        ["identifier -> Identifier \"x\" wasn't found."]
    );
    assert!(alive(&interpretation, "f"));
    assert!(alive(&interpretation, "Global"));
}

#[test]
fn imports_keep_namespaces_alive() {
    let helper = json!({
        "type": "namespaceDeclaration",
        "identifier": id("H"),
        "body": {"type": "namespaceBody", "statements": [var("v", int(1))]}
    });
    let library = json!({
        "type": "namespaceDeclaration",
        "identifier": id("Lib"),
        "body": {"type": "namespaceBody", "statements": [helper]}
    });

    let interpretation = run(&[
        library,
        json!({"type": "importDeclaration", "value": chain(id("Lib"), "H")}),
        json!({"type": "deleteExpression", "value": id("Lib")}),
        print(chain(id("H"), "v")),
    ]);

    assert_eq!(output(&interpretation), ["1"]);
    assert!(alive(&interpretation, "H"));
    assert!(diagnostics(&interpretation, Level::Error).is_empty());
}

#[test]
fn undeclared_throws_warn_and_still_unwind() {
    let interpretation = run(&[
        function("f", &[], &[json!({"type": "throwStatement", "value": string("boom")})]),
        var("caught", json!({"type": "tryExpression", "nillable": true, "value": call(id("f"), &[])})),
        print(string("after try")),
        call(id("f"), &[]),
        print(string("unreachable")),
    ]);

    assert_eq!(output(&interpretation), ["after try"]);
    assert_eq!(
        diagnostics(&interpretation, Level::Warning),
        ["callExpression -> Function \"f\" threw without being declared as throwing."]
    );
    assert_eq!(
        diagnostics(&interpretation, Level::Error),
        ["callExpression -> Uncaught throw of boom."]
    );
}

#[test]
fn call_stack_overflow_aborts_one_statement() {
    let preferences = Preferences {
        call_stack_size: 16,
        ..Preferences::default()
    };
    let tree = module(&[
        function(
            "f",
            &[],
            &[json!({"type": "returnStatement", "value": call(id("f"), &[])})],
        ),
        call(id("f"), &[]),
        print(string("next")),
    ]);

    let mut interpreter = Interpreter::new(preferences);
    interpreter.run_module(&tree);

    assert!(interpreter.scopes().is_empty());
    assert_eq!(interpreter.control().depth(), 0);
    let errors: Vec<&str> = interpreter
        .reports()
        .iter()
        .filter(|report| report.level == Level::Error)
        .map(|report| report.string.as_str())
        .collect();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].starts_with("Maximum call stack size exceeded.\n0: "));
    let output: Vec<&str> = interpreter
        .reports()
        .iter()
        .filter(|report| report.level == Level::Info)
        .map(|report| report.string.as_str())
        .collect();
    assert_eq!(output, ["next"]);
}

#[test]
fn objects_initialize_and_deinitialize() {
    let class = json!({
        "type": "classDeclaration",
        "identifier": id("Point"),
        "body": {"type": "classBody", "statements": [
            var("x", int(0)),
            {
                "type": "initializerDeclaration",
                "signature": {
                    "type": "functionSignature",
                    "parameters": [{"type": "parameter", "identifier": id("x")}]
                },
                "body": body(&[seq(&[chain(id("self"), "x"), json!("="), id("x")])])
            },
            {
                "type": "deinitializerDeclaration",
                "body": body(&[print(string("deinit"))])
            }
        ]}
    });

    let interpretation = run(&[
        class,
        var("p", call(id("Point"), &[int(3)])),
        print(chain(id("p"), "x")),
        seq(&[id("p"), json!("="), json!({"type": "nilLiteral"})]),
        print(string("end")),
    ]);

    assert_eq!(output(&interpretation), ["3", "deinit", "end"]);
    assert!(!alive(&interpretation, "Object<Point>"));
    assert!(alive(&interpretation, "Point"));
}

#[test]
fn methods_see_their_object() {
    let class = json!({
        "type": "classDeclaration",
        "identifier": id("Counter"),
        "body": {"type": "classBody", "statements": [
            var("count", int(10)),
            {"type": "initializerDeclaration", "signature": {"type": "functionSignature"}, "body": body(&[])},
            function("next", &[], &[
                seq(&[id("count"), json!("+="), int(1)]),
                json!({"type": "returnStatement", "value": id("count")})
            ])
        ]}
    });

    let interpretation = run(&[
        class,
        var("counter", call(id("Counter"), &[])),
        call(chain(id("counter"), "next"), &[]),
        print(call(chain(id("counter"), "next"), &[])),
    ]);

    assert_eq!(output(&interpretation), ["12"]);
}

#[test]
fn loops_honor_break_and_continue() {
    let condition = |operator: &str, value: i64| seq(&[id("i"), json!(operator), int(value)]);
    let interpretation = run(&[
        var("i", int(0)),
        var("sum", int(0)),
        json!({
            "type": "whileStatement",
            "condition": {"type": "booleanLiteral", "value": "true"},
            "value": body(&[
                seq(&[id("i"), json!("+="), int(1)]),
                json!({"type": "ifStatement", "condition": condition(">", 5), "then": body(&[json!({"type": "breakStatement"})])}),
                json!({
                    "type": "ifStatement",
                    "condition": seq(&[id("i"), json!("%"), int(2), json!("=="), int(0)]),
                    "then": body(&[json!({"type": "continueStatement"})])
                }),
                seq(&[id("sum"), json!("="), id("sum"), json!("+"), id("i")])
            ])
        }),
        print(id("sum")),
    ]);

    assert_eq!(output(&interpretation), ["9"]);
}

#[test]
fn operators_follow_precedence() {
    let interpretation = run(&[
        print(seq(&[int(2), json!("+"), int(3), json!("*"), int(4)])),
        print(seq(&[int(10), json!("-"), int(2), json!("-"), int(3)])),
        print(seq(&[string("n = "), json!("+"), int(1)])),
        print(json!({"type": "prefixExpression", "operator": {"type": "prefixOperator", "value": "!"}, "value": {"type": "booleanLiteral", "value": "false"}})),
        print(seq(&[int(1), json!("/"), int(0)])),
    ]);

    assert_eq!(output(&interpretation), ["14", "5", "n = 1", "true", "nil"]);
    assert_eq!(
        diagnostics(&interpretation, Level::Error),
        ["expressionsSequence -> Division by zero."]
    );
}

#[test]
fn declared_operators_change_precedence() {
    let operator = json!({
        "type": "operatorDeclaration",
        "modifiers": ["infix"],
        "operator": {"type": "infixOperator", "value": "+"},
        "body": {"type": "operatorBody", "statements": [
            {"type": "entry", "key": id("precedence"), "value": int(200)},
            {"type": "entry", "key": id("associativity"), "value": id("left")}
        ]}
    });

    let interpretation = run(&[
        operator,
        print(seq(&[int(2), json!("+"), int(3), json!("*"), int(4)])),
    ]);

    assert_eq!(output(&interpretation), ["20"]);
}

#[test]
fn else_if_chains_pick_one_branch() {
    let classify = json!({
        "type": "ifStatement",
        "condition": seq(&[id("n"), json!("<"), int(0)]),
        "then": body(&[print(string("negative"))]),
        "else": {
            "type": "ifStatement",
            "condition": seq(&[id("n"), json!("=="), int(0)]),
            "then": body(&[print(string("zero"))]),
            "else": body(&[print(string("positive"))])
        }
    });

    for (value, expected) in [(-1, "negative"), (0, "zero"), (4, "positive")] {
        let interpretation = run(&[var("n", int(value)), classify.clone()]);
        assert_eq!(output(&interpretation), [expected]);
    }
}

#[test]
fn observers_run_around_assignments() {
    let declaration = json!({
        "type": "variableDeclaration",
        "declarators": [{
            "type": "declarator",
            "identifier": id("level"),
            "value": int(1),
            "body": {"type": "observersBody", "statements": [
                {"type": "observerDeclaration", "identifier": id("willSet"), "body": body(&[print(id("newValue"))])},
                {"type": "observerDeclaration", "identifier": id("didSet"), "body": body(&[print(id("oldValue"))])}
            ]}
        }]
    });

    let interpretation = run(&[declaration, seq(&[id("level"), json!("="), int(2)]), print(id("level"))]);

    assert_eq!(output(&interpretation), ["2", "1", "2"]);
}

#[test]
fn parameters_bind_defaults_and_interpolate() {
    let greet = json!({
        "type": "functionDeclaration",
        "identifier": id("greet"),
        "signature": {"type": "functionSignature", "parameters": [
            {"type": "parameter", "identifier": id("name")},
            {"type": "parameter", "identifier": id("punctuation"), "value": string("!")}
        ]},
        "body": body(&[json!({"type": "returnStatement", "value": {
            "type": "stringLiteral",
            "segments": [
                {"type": "stringSegment", "value": "Hi "},
                {"type": "stringExpression", "value": id("name")},
                {"type": "stringExpression", "value": id("punctuation")}
            ]
        }})])
    });

    let interpretation = run(&[
        greet,
        print(call(id("greet"), &[string("Ada")])),
        print(call(id("greet"), &[string("Bo"), string("?")])),
    ]);

    assert_eq!(output(&interpretation), ["Hi Ada!", "Hi Bo?"]);
}

#[test]
fn stores_carry_over_between_runs() {
    let first = run(&[var("x", int(41))]);
    let json = snapshot::save(&first.composites).unwrap();
    let store = snapshot::restore(&json).unwrap();

    let second = interpret(
        Vec::new(),
        &module(&[print(seq(&[id("x"), json!("+"), int(1)]))]),
        Some(store),
        Preferences::default(),
    );

    assert_eq!(output(&second), ["42"]);
}

fn point_class() -> Json {
    json!({
        "type": "classDeclaration",
        "identifier": id("Point"),
        "body": {"type": "classBody", "statements": [
            {"type": "initializerDeclaration", "signature": {"type": "functionSignature"}, "body": body(&[])},
            {"type": "deinitializerDeclaration", "body": body(&[print(string("deinit"))])}
        ]}
    })
}

fn if_true(statements: &[Json]) -> Json {
    json!({"type": "ifStatement", "condition": {"type": "booleanLiteral", "value": "true"}, "then": body(statements)})
}

#[test]
fn branch_values_are_collected_with_their_statement() {
    let interpretation = run(&[point_class(), if_true(&[call(id("Point"), &[])]), print(string("end"))]);

    assert_eq!(output(&interpretation), ["deinit", "end"]);
    assert!(!alive(&interpretation, "Object<Point>"));

    let interpretation = run(&[
        point_class(),
        function("f", &[], &[
            if_true(&[call(id("Point"), &[])]),
            print(string("after")),
            json!({"type": "returnStatement", "value": int(1)}),
        ]),
        print(call(id("f"), &[])),
        print(string("end")),
    ]);

    assert_eq!(output(&interpretation), ["deinit", "after", "1", "end"]);
    assert!(!alive(&interpretation, "Object<Point>"));
}

#[test]
fn implicit_results_survive_until_used() {
    let interpretation = run(&[
        point_class(),
        function("make", &[], &[if_true(&[call(id("Point"), &[])])]),
        var("p", call(id("make"), &[])),
        print(string("kept")),
        seq(&[id("p"), json!("="), json!({"type": "nilLiteral"})]),
    ]);

    assert_eq!(output(&interpretation), ["kept", "deinit"]);
}

#[test]
fn initializers_delegate_through_self() {
    let class = json!({
        "type": "classDeclaration",
        "identifier": id("Point"),
        "body": {"type": "classBody", "statements": [
            var("x", int(0)),
            {
                "type": "initializerDeclaration",
                "signature": {"type": "functionSignature"},
                "body": body(&[call(chain(id("self"), "init"), &[int(5)])])
            },
            {
                "type": "initializerDeclaration",
                "signature": {
                    "type": "functionSignature",
                    "parameters": [{"type": "parameter", "identifier": id("x")}]
                },
                "body": body(&[seq(&[chain(id("self"), "x"), json!("="), id("x")])])
            }
        ]}
    });

    let interpretation = run(&[class, var("p", call(id("Point"), &[])), print(chain(id("p"), "x"))]);

    assert_eq!(output(&interpretation), ["5"]);
    let objects = interpretation
        .composites
        .iter()
        .filter(|(_, composite)| composite.title.as_deref() == Some("Object<Point>"))
        .count();
    assert_eq!(objects, 1);
}

#[test]
fn generic_arguments_bind_on_the_most_derived_object() {
    let base = json!({
        "type": "classDeclaration",
        "identifier": id("Base"),
        "body": {"type": "classBody", "statements": [
            {"type": "initializerDeclaration", "signature": {"type": "functionSignature"}, "body": body(&[])}
        ]}
    });
    let boxed = json!({
        "type": "classDeclaration",
        "identifier": id("Box"),
        "genericParameters": [{"type": "genericParameter", "identifier": id("T")}],
        "inheritedTypes": [{"type": "typeIdentifier", "identifier": id("Base")}],
        "body": {"type": "classBody", "statements": [
            {"type": "initializerDeclaration", "signature": {"type": "functionSignature"}, "body": body(&[])}
        ]}
    });
    let instantiate = json!({
        "type": "callExpression",
        "callee": id("Box"),
        "genericArguments": [{"type": "predefinedType", "value": "int"}],
        "arguments": []
    });

    let interpretation = run(&[base, boxed, var("b", instantiate)]);

    let binds_t = |title: &str| {
        interpretation
            .composites
            .iter()
            .find(|(_, composite)| composite.title.as_deref() == Some(title))
            .map(|(_, composite)| composite.members.contains_key("T"))
    };
    assert_eq!(binds_t("Object<Box>"), Some(true));
    assert_eq!(binds_t("Object<Base>"), Some(false));
    assert!(diagnostics(&interpretation, Level::Error).is_empty());
}

#[test]
fn non_associative_operators_refuse_chaining() {
    let interpretation = run(&[
        print(seq(&[int(1), json!("<"), int(2), json!("<"), int(3)])),
        print(seq(&[int(1), json!("<"), int(2), json!("&&"), int(2), json!("<"), int(3)])),
    ]);

    assert_eq!(output(&interpretation), ["nil", "true"]);
    assert_eq!(
        diagnostics(&interpretation, Level::Error),
        ["expressionsSequence -> Operator \"<\" is non-associative and can't be chained."]
    );
}
