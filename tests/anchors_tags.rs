use yamlcore::{load, load_all, load_with_options, Listener, LoadOptions, Location, Value};

#[test]
fn alias_resolves_to_the_anchored_value() {
    let doc = load("a: &anchor [1, 2, 3]\nb: *anchor\n").unwrap().unwrap();
    assert_eq!(doc.get("a"), doc.get("b"));
    assert_eq!(
        doc.get("b"),
        Some(&Value::Sequence(vec![
            Value::Int(1),
            Value::Int(2),
            Value::Int(3)
        ]))
    );
}

#[test]
fn scalar_anchor_captures_the_constructed_value() {
    let doc = load("a: &n 42\nb: *n\n").unwrap().unwrap();
    assert_eq!(doc.get("b"), Some(&Value::Int(42)));
}

#[test]
fn alias_can_repeat_within_a_collection() {
    let doc = load("- &x one\n- *x\n- *x\n").unwrap().unwrap();
    let items = doc.as_sequence().unwrap();
    assert_eq!(items[1], Value::String("one".into()));
    assert_eq!(items[2], items[1]);
}

#[test]
fn unidentified_alias_is_fatal() {
    let err = load("a: *missing\n").unwrap_err();
    assert!(err.to_string().contains("unidentified alias \"missing\""));
}

#[test]
fn anchors_do_not_leak_across_documents() {
    let err = load_all("&a 1\n---\n*a\n").unwrap_err();
    assert!(err.to_string().contains("unidentified alias \"a\""));
}

#[test]
fn alias_with_properties_is_fatal() {
    let err = load("a: &x 1\nb: !!str *x\n").unwrap_err();
    assert!(err
        .to_string()
        .contains("alias node should not have any properties"));
}

#[test]
fn duplicate_anchor_property_is_fatal() {
    let err = load("a: &x &y 1\n").unwrap_err();
    assert!(err.to_string().contains("duplication of an anchor property"));
}

#[test]
fn empty_anchor_name_is_fatal() {
    let err = load("a: & 1\n").unwrap_err();
    assert!(err
        .to_string()
        .contains("name of an anchor node must contain at least one character"));
}

#[test]
fn anchor_redefinition_last_wins() {
    let doc = load("a: &x 1\nb: &x 2\nc: *x\n").unwrap().unwrap();
    assert_eq!(doc.get("c"), Some(&Value::Int(2)));
}

#[test]
fn self_referential_alias_sees_the_container_registration() {
    // the anchor is registered when the collection opens, so an alias inside
    // the body resolves (to the registration, since values are owned)
    let doc = load("a: &self [1, *self]\n").unwrap().unwrap();
    let seq = doc.get("a").unwrap().as_sequence().unwrap();
    assert_eq!(seq[0], Value::Int(1));
    assert_eq!(seq[1], Value::Sequence(Vec::new()));
}

#[test]
fn explicit_str_tag_keeps_scalar_text() {
    assert_eq!(load("!!str 42\n").unwrap(), Some(Value::String("42".into())));
}

#[test]
fn explicit_int_tag_converts_quoted_scalar() {
    let doc = load("n: !!int '42'\n").unwrap().unwrap();
    assert_eq!(doc.get("n"), Some(&Value::Int(42)));
}

#[test]
fn explicit_tag_with_no_content_constructs_empty_value() {
    assert_eq!(load("!!str\n").unwrap(), Some(Value::String(String::new())));
    assert_eq!(load("!!seq\n").unwrap(), Some(Value::Sequence(Vec::new())));
}

#[test]
fn verbatim_tag_form() {
    assert_eq!(
        load("!<tag:yaml.org,2002:str> 42\n").unwrap(),
        Some(Value::String("42".into()))
    );
}

#[test]
fn unknown_tag_is_fatal() {
    let err = load("!!timestamp 2001-12-14\n").unwrap_err();
    assert!(err
        .to_string()
        .contains("unknown tag !<tag:yaml.org,2002:timestamp>"));
}

#[test]
fn kind_mismatch_is_fatal() {
    let err = load("!!seq scalar-text\n").unwrap_err();
    assert!(err.to_string().contains("unacceptable node kind"));
}

#[test]
fn unresolvable_tagged_value_is_fatal() {
    let err = load("!!int not-a-number\n").unwrap_err();
    assert!(err
        .to_string()
        .contains("cannot resolve a node with !<tag:yaml.org,2002:int> tag"));
}

#[test]
fn duplicate_tag_property_is_fatal() {
    let err = load("a: !!str !!str x\n").unwrap_err();
    assert!(err.to_string().contains("duplication of a tag property"));
}

#[test]
fn bare_non_specific_tag_suppresses_resolution() {
    assert_eq!(load("! 42\n").unwrap(), Some(Value::String("42".into())));
}

#[test]
fn tag_directive_expands_custom_handle() {
    let doc = load("%TAG !y! tag:yaml.org,2002:\n---\n!y!int 42\n").unwrap();
    assert_eq!(doc, Some(Value::Int(42)));
}

#[test]
fn undeclared_handle_is_fatal() {
    let err = load("!u!str x\n").unwrap_err();
    assert!(err.to_string().contains("undeclared tag handle \"!u!\""));
}

#[test]
fn tag_directives_reset_between_documents() {
    let err = load_all("%TAG !y! tag:yaml.org,2002:\n---\n!y!int 1\n---\n!y!int 2\n").unwrap_err();
    assert!(err.to_string().contains("undeclared tag handle \"!y!\""));
}

#[test]
fn percent_encoded_tag_names_decode() {
    // %21 decodes to '!', yielding local tag "!x!y" via the single-! handle
    let err = load("!x%21y 1\n").unwrap_err();
    assert!(err.to_string().contains("unknown tag !<!x!y>"));
}

#[derive(Default)]
struct CountingListener {
    opens: Vec<Location>,
    closes: usize,
    closed_values: usize,
}

impl Listener for CountingListener {
    fn open(&mut self, location: Location) {
        self.opens.push(location);
    }

    fn close(&mut self, _location: Location, value: Option<&Value>) {
        self.closes += 1;
        if value.is_some() {
            self.closed_values += 1;
        }
    }
}

#[test]
fn listener_sees_balanced_open_close_events() {
    let mut listener = CountingListener::default();
    {
        let options = LoadOptions::new().with_listener(&mut listener);
        load_with_options("a: [1, 2]\n", options).unwrap();
    }
    // root mapping, its key, its value, and the two flow entries
    assert_eq!(listener.opens.len(), listener.closes);
    assert!(listener.opens.len() >= 5);
    assert!(listener.closed_values >= 5);
    assert_eq!(listener.opens[0].line, 0);
}
