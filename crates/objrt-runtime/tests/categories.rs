//! Integration tests for category application

use objrt_runtime::{
    CategoryConflictPolicy, CategoryDescriptor, CategoryStatus, ClassDescriptor, Imp, Protocol,
    Runtime, RuntimeOptions, Value,
};

fn returns(s: &'static str) -> Imp {
    Imp::new(move |_| Ok(Value::from(s)))
}

fn instance(runtime: &Runtime, class: &str) -> Value {
    let class = runtime.class_for_name(class).unwrap();
    Value::Object(runtime.create_instance(&class).unwrap())
}

#[test]
fn test_category_after_link_rebuilds_dtable() {
    let runtime = Runtime::new();
    runtime
        .register_class(ClassDescriptor::new("A").method("old", returns("old")))
        .unwrap();
    let sub = runtime
        .register_class(ClassDescriptor::new("B").superclass("A"))
        .unwrap();
    let builds_before = runtime.stats().dtable_builds;

    let extra = returns("extra");
    let status =
        runtime.apply_category(CategoryDescriptor::new("Extras", "A").method("extra", extra.clone()));
    assert_eq!(status, CategoryStatus::Applied);
    assert!(runtime.stats().dtable_builds > builds_before);

    let sel = runtime.selector("extra").unwrap();
    let a = instance(&runtime, "A");
    assert_eq!(runtime.lookup_imp(&a, sel), Some(extra.clone()));
    assert_eq!(runtime.send(&a, sel, &[]).unwrap(), Value::from("extra"));

    // Descendants copied the old table and are rebuilt too
    assert!(runtime.responds_to(&sub, sel));
}

#[test]
fn test_category_before_class() {
    let runtime = Runtime::new();
    let status = runtime.apply_category(
        CategoryDescriptor::new("Early", "Late")
            .method("hello", returns("early"))
            .class_method("make", returns("made")),
    );
    assert_eq!(status, CategoryStatus::Pending);
    assert_eq!(runtime.stats().pending_categories, 1);

    runtime.register_class(ClassDescriptor::new("Late")).unwrap();
    assert_eq!(runtime.stats().pending_categories, 0);

    let hello = runtime.selector("hello").unwrap();
    let make = runtime.selector("make").unwrap();
    let late = runtime.class_for_name("Late").unwrap();
    assert_eq!(
        runtime.send(&instance(&runtime, "Late"), hello, &[]).unwrap(),
        Value::from("early")
    );
    assert_eq!(
        runtime.send(&Value::Class(late), make, &[]).unwrap(),
        Value::from("made")
    );
}

#[test]
fn test_category_overrides_class_method_list() {
    let runtime = Runtime::new();
    runtime
        .register_class(ClassDescriptor::new("Widget").method("draw", returns("plain")))
        .unwrap();
    runtime.apply_category(CategoryDescriptor::new("Fancy", "Widget").method("draw", returns("fancy")));

    let draw = runtime.selector("draw").unwrap();
    assert_eq!(
        runtime.send(&instance(&runtime, "Widget"), draw, &[]).unwrap(),
        Value::from("fancy")
    );
}

#[test]
fn test_reapplying_category_is_idempotent() {
    let runtime = Runtime::new();
    let class = runtime.register_class(ClassDescriptor::new("Doc")).unwrap();
    let category = || {
        CategoryDescriptor::new("Printing", "Doc")
            .method("print", returns("printed"))
            .method("preview", returns("preview"))
    };

    runtime.apply_category(category());
    let table = class.dtable().unwrap();
    runtime.apply_category(category());
    runtime.apply_category(category());
    let again = class.dtable().unwrap();

    assert_eq!(table.len(), 2);
    assert_eq!(again.len(), 2);
}

#[test]
fn test_last_applied_category_wins_by_default() {
    let runtime = Runtime::new();
    runtime.register_class(ClassDescriptor::new("Text")).unwrap();
    runtime.apply_category(CategoryDescriptor::new("One", "Text").method("style", returns("one")));
    runtime.apply_category(CategoryDescriptor::new("Two", "Text").method("style", returns("two")));

    let style = runtime.selector("style").unwrap();
    assert_eq!(
        runtime.send(&instance(&runtime, "Text"), style, &[]).unwrap(),
        Value::from("two")
    );

    // Replacing "One" keeps its place in the application order
    runtime.apply_category(CategoryDescriptor::new("One", "Text").method("style", returns("one again")));
    assert_eq!(
        runtime.send(&instance(&runtime, "Text"), style, &[]).unwrap(),
        Value::from("two")
    );
}

#[test]
fn test_first_applied_category_wins_when_configured() {
    let options = RuntimeOptions::from_toml_str(r#"category_conflicts = "first-applied""#).unwrap();
    assert_eq!(options.category_conflicts, CategoryConflictPolicy::FirstApplied);

    let runtime = Runtime::with_options(options).unwrap();
    runtime.register_class(ClassDescriptor::new("Text")).unwrap();
    runtime.apply_category(CategoryDescriptor::new("One", "Text").method("style", returns("one")));
    runtime.apply_category(CategoryDescriptor::new("Two", "Text").method("style", returns("two")));

    let style = runtime.selector("style").unwrap();
    assert_eq!(
        runtime.send(&instance(&runtime, "Text"), style, &[]).unwrap(),
        Value::from("one")
    );
}

#[test]
fn test_category_protocols_and_superclass_conformance() {
    let runtime = Runtime::new();
    let base = runtime
        .register_class(ClassDescriptor::new("Base").protocol(Protocol::new("Object")))
        .unwrap();
    let derived = runtime
        .register_class(ClassDescriptor::new("Derived").superclass("Base"))
        .unwrap();

    assert!(runtime.conforms_to(&derived, "Object"));
    assert!(!runtime.conforms_to(&derived, "Copying"));

    let copying = Protocol::with_parents("MutableCopying", vec![Protocol::new("Copying")]);
    runtime.apply_category(CategoryDescriptor::new("Copy", "Base").protocol(copying));

    assert!(runtime.conforms_to(&base, "MutableCopying"));
    assert!(runtime.conforms_to(&derived, "Copying"));
}

#[test]
fn test_replace_method_defined_by_category() {
    let runtime = Runtime::new();
    let class = runtime.register_class(ClassDescriptor::new("A")).unwrap();
    let tag = returns("category");
    runtime.apply_category(CategoryDescriptor::new("Extras", "A").method("tag", tag.clone()));

    let sel = runtime.selector("tag").unwrap();
    let object = instance(&runtime, "A");
    assert_eq!(runtime.add_method(&class, sel, returns("added"), None), Ok(false));

    let previous = runtime
        .replace_method(&class, sel, returns("replaced"), None)
        .unwrap();
    assert_eq!(previous, Some(tag));
    assert_eq!(runtime.send(&object, sel, &[]).unwrap(), Value::from("replaced"));
}
