use dompath::dom::DomNode;
use dompath::dom::tree::{Document, TreeBuilder};
use dompath::{EvalOptions, XNode, parse, select, use_namespaces};
use std::collections::HashMap;

/// <cat:catalog xmlns:cat="urn:catalog" xmlns="urn:default">
///   <cat:item sku="1"/><item/><other xmlns:cat="urn:other"><cat:item sku="2"/></other>
/// </cat:catalog>
fn catalog() -> Document {
    let mut b = TreeBuilder::new();
    b.open("cat:catalog");
    b.attr("xmlns:cat", "urn:catalog");
    b.attr("xmlns", "urn:default");
    b.open("cat:item");
    b.attr("sku", "1");
    b.close();
    b.open("item");
    b.close();
    b.open("other");
    b.attr("xmlns:cat", "urn:other");
    b.open("cat:item");
    b.attr("sku", "2");
    b.close();
    b.close();
    b.close();
    b.finish()
}

#[test]
fn prefixes_resolve_through_the_document_by_default() {
    let doc = catalog();
    // The default resolver sees the declarations in scope at the context
    // node, so the outer binding of cat: applies.
    let items = select("//cat:item", doc.root()).unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].namespace_uri().as_deref(), Some("urn:catalog"));
}

#[test]
fn explicit_bindings_override_the_document() {
    let doc = catalog();
    let sel = use_namespaces(&[("k", "urn:other")]);
    let items = sel.select("//k:item", doc.root()).unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].namespace_uri().as_deref(), Some("urn:other"));

    let sel = use_namespaces(&[("k", "urn:catalog")]);
    assert_eq!(sel.select("//k:*", doc.root()).unwrap().len(), 2);
}

#[test]
fn unprefixed_tests_ignore_the_default_namespace() {
    let doc = catalog();
    // Both unprefixed elements are in urn:default, so a plain name test
    // matches neither.
    assert!(select("//item", doc.root()).unwrap().is_empty());

    // allow_any_namespace_for_no_prefix turns the name test into a
    // local-name match.
    let mut opts = EvalOptions::new(doc.root());
    opts.allow_any_namespace_for_no_prefix = true;
    let items = parse("//item").unwrap().select(&opts).unwrap();
    assert_eq!(items.len(), 3);
}

#[test]
fn unresolvable_prefix_is_an_error() {
    let doc = catalog();
    let resolver: HashMap<String, String> = HashMap::new();
    let opts = EvalOptions::new(doc.root()).namespaces(&resolver);
    let err = parse("//cat:item").unwrap().select(&opts).unwrap_err();
    assert!(err.to_string().contains("cat"));
}

#[test]
fn namespace_axis_materialises_in_scope_bindings() {
    let doc = catalog();
    let sel = use_namespaces(&[("d", "urn:default")]);
    let inner_item = sel.select("//d:other/*", doc.root()).unwrap();
    assert_eq!(inner_item.len(), 1);
    let XNode::Dom(inner_item) = inner_item[0].clone() else {
        panic!("expected element");
    };

    // In scope on the innermost item: xml (implicit), cat (shadowed by
    // urn:other) and the default binding.
    let namespaces = select("namespace::*", inner_item).unwrap();
    let pairs: Vec<(String, String)> = namespaces
        .iter()
        .map(|n| (n.node_name(), n.string_value()))
        .collect();
    assert_eq!(pairs[0].0, "xml");
    assert!(pairs.contains(&("cat".to_string(), "urn:other".to_string())));
    assert!(pairs.contains(&(String::new(), "urn:default".to_string())));
    assert_eq!(pairs.len(), 3);

    // Selecting one binding by prefix.
    let cat = select("namespace::cat", inner_item).unwrap();
    assert_eq!(cat.len(), 1);
    assert_eq!(cat[0].string_value(), "urn:other");
}

#[test]
fn namespace_nodes_are_per_element() {
    let doc = catalog();
    let sel = use_namespaces(&[("c", "urn:catalog")]);
    let item = sel.select1("//c:item", doc.root()).unwrap().unwrap();
    let XNode::Dom(item) = item else { panic!("expected element") };
    let namespaces = select("namespace::*", item).unwrap();
    for ns in &namespaces {
        let XNode::Namespace(ns) = ns else { panic!("expected namespace node") };
        assert_eq!(ns.owner.node_name(), "cat:item");
    }
}

#[test]
fn namespace_uri_function_reads_the_expanded_name() {
    let doc = catalog();
    let sel = use_namespaces(&[("c", "urn:catalog")]);
    let item = sel.select1("//c:item", doc.root()).unwrap().unwrap();
    let XNode::Dom(item) = item else { panic!("expected element") };
    let opts = EvalOptions::new(item);
    assert_eq!(
        parse("namespace-uri(.)").unwrap().string(&opts).unwrap(),
        "urn:catalog"
    );
    assert_eq!(parse("local-name(.)").unwrap().string(&opts).unwrap(), "item");
    assert_eq!(parse("name(.)").unwrap().string(&opts).unwrap(), "cat:item");
    // Attributes in no namespace.
    assert_eq!(
        parse("namespace-uri(@sku)").unwrap().string(&opts).unwrap(),
        ""
    );
}

#[test]
fn variables_resolve_through_namespaces() {
    let doc = catalog();
    let mut namespaces = HashMap::new();
    namespaces.insert("v".to_string(), "urn:vars".to_string());
    let mut variables: HashMap<String, dompath::Value<_>> = HashMap::new();
    variables.insert("{urn:vars}answer".to_string(), dompath::Value::Number(42.0));
    variables.insert("plain".to_string(), dompath::Value::Number(7.0));

    let opts = EvalOptions::new(doc.root())
        .namespaces(&namespaces)
        .variables(&variables);
    assert_eq!(parse("$v:answer").unwrap().number(&opts).unwrap(), 42.0);
    assert_eq!(parse("$plain").unwrap().number(&opts).unwrap(), 7.0);
}
