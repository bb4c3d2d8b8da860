//! Named-unit matching and name/reference extraction over a parsed srcml
//! tree (4.C). Grounded on the original reference implementation's
//! `NAMED_UNIT_QUERY`/`get_named_unit_name`/`CALLING_UNIT_QUERY`: the
//! predicates and the name-extraction rewrite loop below are a line-by-line
//! port of that XPath-and-lxml logic onto a plain tree walk, since no XPath
//! engine exists in the pack's dependency stack.

use crate::record::FileRecord;
use crate::types::LineRange;
use indexmap::IndexSet;

use super::xmltree::XmlNode;

/// A named unit found in the tree, paired with its preceding sibling (only
/// relevant for the macro-body `block` case).
struct UnitMatch<'a> {
    node: &'a XmlNode,
    preceding: Option<&'a XmlNode>,
}

fn is_named_unit(
    child: &XmlNode,
    parent: &XmlNode,
    grandparent: Option<&XmlNode>,
    great_grandparent: Option<&XmlNode>,
    template_depth: u32,
    preceding: Option<&XmlNode>,
) -> bool {
    if child.is_src("constructor") || child.is_src("constructor_decl") {
        return true;
    }
    if child.is_src("function") || child.is_src("function_decl") {
        return child.attrs.get("type").map(String::as_str) != Some("operator");
    }
    if child.is_src("destructor") || child.is_src("destructor_decl") {
        return true;
    }
    if child.is_src("class") || child.is_src("class_decl") {
        return template_depth == 0;
    }
    if child.is_src("struct") || child.is_src("struct_decl") {
        return true;
    }
    if child.is_src("enum") || child.is_src("typedef") || child.is_src("union") {
        return true;
    }
    if child.is_src("block") {
        return preceding.is_some_and(|p| p.is_src("macro"));
    }
    if child.is_src("decl") {
        return parent.is_src("decl_stmt")
            && grandparent.is_some_and(|g| g.is_src("block"))
            && great_grandparent.is_some_and(|g| g.is_src("namespace"));
    }
    false
}

fn walk<'a>(
    node: &'a XmlNode,
    parent: Option<&'a XmlNode>,
    grandparent: Option<&'a XmlNode>,
    great_grandparent: Option<&'a XmlNode>,
    template_depth: u32,
    out: &mut Vec<UnitMatch<'a>>,
) {
    let this_depth = template_depth + u32::from(node.is_src("template"));

    for (i, child) in node.children.iter().enumerate() {
        let preceding = if i > 0 { Some(&node.children[i - 1]) } else { None };

        if is_named_unit(child, node, parent, grandparent, this_depth, preceding) {
            out.push(UnitMatch { node: child, preceding });
        }

        walk(child, Some(node), parent, grandparent, this_depth, out);
    }
}

fn collect_named_units(root: &XmlNode) -> Vec<UnitMatch<'_>> {
    let mut out = Vec::new();
    walk(root, None, None, None, 0, &mut out);
    out
}

fn collect_name_leaf_texts(node: &XmlNode, out: &mut IndexSet<String>) {
    for child in &node.children {
        if child.is_src("name") {
            let text = child.text.trim();
            if !text.is_empty() {
                out.insert(text.to_string());
            }
        }
        collect_name_leaf_texts(child, out);
    }
}

fn collect_body_references(node: &XmlNode, out: &mut IndexSet<String>) {
    for child in &node.children {
        if child.is_src("call") || child.is_src("type") {
            collect_name_leaf_texts(child, out);
        }
        collect_body_references(child, out);
    }
}

/// Port of the reference implementation's name-extraction rewrite loop.
/// Returns the unit's own name (empty if it could never be resolved) and
/// the set of names referenced while resolving it (qualifying heads and
/// argument/index contents picked up along the way).
fn extract_name(unit: &XmlNode, preceding: Option<&XmlNode>) -> (String, IndexSet<String>) {
    if unit.is_src("block") {
        let name = preceding.map(XmlNode::full_text).unwrap_or_default();
        return (name.trim().to_string(), IndexSet::new());
    }

    let Some(name_unit) = unit.children.iter().find(|c| c.is_src("name")) else {
        return (String::new(), IndexSet::new());
    };

    let mut calls = IndexSet::new();
    let mut name = String::new();
    let mut name_found = false;
    let mut units: Vec<&XmlNode> = name_unit.children.iter().collect();

    if units.is_empty() || (units.len() == 1 && units[0].is_src("position")) {
        name = name_unit.text.trim().to_string();
        name_found = true;
    }

    while !name_found {
        if units.len() == 1 && units[0].is_src("name") {
            let candidate = units[0].text.trim();
            if candidate.is_empty() {
                units = units[0].children.iter().collect();
            } else {
                name = candidate.to_string();
                name_found = true;
            }
        } else if units.len() >= 3
            && units[1].is_src("operator")
            && matches!(units[1].text.trim(), "::" | "->" | ".")
        {
            calls.insert(units[0].text.trim().to_string());
            units = units[2..].to_vec();
        } else if units.len() >= 2 && (units[1].is_src("argument_list") || units[1].is_src("index"))
        {
            collect_name_leaf_texts(units[1], &mut calls);
            units.remove(1);
        } else if !units.is_empty() && (units[0].is_src("operator") || units[0].is_src("modifier"))
        {
            units = units[1..].to_vec();
        } else if !units.is_empty() && units[0].is_src("typename") {
            return (String::new(), IndexSet::new());
        } else if let Some(pos) = units.iter().position(|u| u.is_src("comment")) {
            units.remove(pos);
        } else {
            break;
        }
    }

    (name, calls)
}

fn collect_includes(node: &XmlNode, out: &mut IndexSet<String>) {
    for child in &node.children {
        if child.is_cpp("include") {
            if let Some(file_node) = child.children.iter().find(|c| c.is_cpp("file")) {
                let text = file_node.full_text();
                let parts: Vec<&str> = text.split('"').collect();
                if parts.len() == 3 {
                    out.insert(parts[1].to_string());
                }
            }
        }
        collect_includes(child, out);
    }
}

/// Build a `FileRecord` from the srcml tree of an entire file (4.C -> 4.D).
pub fn extract_record(own_path: &str, root: &XmlNode) -> FileRecord {
    let mut record = FileRecord::new(own_path);
    collect_includes(root, &mut record.includes);

    for unit_match in collect_named_units(root) {
        let (name, mut refs) = extract_name(unit_match.node, unit_match.preceding);
        if name.is_empty() {
            continue;
        }
        collect_body_references(unit_match.node, &mut refs);
        record.add_unit(name, refs);
    }

    record
}

fn subtree_has_line_in_ranges(node: &XmlNode, ranges: &[LineRange]) -> bool {
    if let Some(line) = node.position_line {
        if ranges.iter().any(|r| r.contains_line(line)) {
            return true;
        }
    }
    node.children.iter().any(|c| subtree_has_line_in_ranges(c, ranges))
}

/// Names of named units whose subtree touches at least one of `ranges`
/// (4.F). Requires a tree parsed from `srcml --position` output.
pub fn extract_changed_unit_names(root: &XmlNode, ranges: &[LineRange]) -> IndexSet<String> {
    let mut names = IndexSet::new();
    for unit_match in collect_named_units(root) {
        if subtree_has_line_in_ranges(unit_match.node, ranges) {
            let (name, _) = extract_name(unit_match.node, unit_match.preceding);
            if !name.is_empty() {
                names.insert(name);
            }
        }
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::srcml::xmltree::parse;

    #[test]
    fn extracts_simple_function_name() {
        let xml = br#"<unit>
            <function><type><name>void</name></type> <name>helper</name>
            <parameter_list>()</parameter_list>
            <block>{ <expr_stmt><expr><call><name>other</name><argument_list>()</argument_list></call></expr></expr_stmt>; }</block>
            </function>
        </unit>"#;
        let root = parse(xml);
        let record = extract_record("a.cpp", &root);
        assert!(record.calls_naive.contains_key("helper"));
        let refs = &record.calls_naive["helper"];
        assert!(refs.contains("helper"));
        assert!(refs.contains("other"));
    }

    #[test]
    fn excludes_operator_overloads() {
        let xml = br#"<unit>
            <function type="operator"><type><name>int</name></type> <name>operator+</name>
            <parameter_list>()</parameter_list><block>{ }</block></function>
        </unit>"#;
        let root = parse(xml);
        let record = extract_record("a.cpp", &root);
        assert!(record.calls_naive.is_empty());
    }

    #[test]
    fn excludes_classes_nested_in_templates() {
        let xml = br#"<unit>
            <template>tpl <class><name>Inner</name><block>{ }</block></class></template>
            <class><name>Outer</name><block>{ }</block></class>
        </unit>"#;
        let root = parse(xml);
        let record = extract_record("a.cpp", &root);
        assert!(!record.calls_naive.contains_key("Inner"));
        assert!(record.calls_naive.contains_key("Outer"));
    }

    #[test]
    fn macro_body_block_named_after_preceding_macro() {
        let xml = br#"<unit>
            <macro><name>MY_MACRO</name><argument_list>()</argument_list></macro>
            <block>{ <expr_stmt><expr><call><name>helper</name><argument_list>()</argument_list></call></expr></expr_stmt>; }</block>
        </unit>"#;
        let root = parse(xml);
        let record = extract_record("a.cpp", &root);
        assert!(record.calls_naive.contains_key("MY_MACRO()"));
    }

    #[test]
    fn qualified_name_contributes_head_as_reference() {
        let xml = br#"<unit>
            <function><type><name>void</name></type> <name>member</name>
            <parameter_list>()</parameter_list>
            <block>{ <expr_stmt><expr><call><name><name>Foo</name><operator>::</operator><name>Bar</name></name><argument_list>()</argument_list></call></expr></expr_stmt>; }</block>
            </function>
        </unit>"#;
        let root = parse(xml);
        let record = extract_record("a.cpp", &root);
        let refs = &record.calls_naive["member"];
        assert!(refs.contains("Foo"));
    }

    #[test]
    fn include_paths_are_extracted_between_quotes() {
        let xml = br#"<unit><cpp:include><cpp:directive>#include</cpp:directive> <cpp:file>"foo/bar.h"</cpp:file></cpp:include></unit>"#;
        let root = parse(xml);
        let record = extract_record("a.cpp", &root);
        assert!(record.includes.contains("foo/bar.h"));
    }

    #[test]
    fn angle_bracket_includes_are_ignored() {
        let xml = br#"<unit><cpp:include><cpp:directive>#include</cpp:directive> <cpp:file>&lt;vector&gt;</cpp:file></cpp:include></unit>"#;
        let root = parse(xml);
        let record = extract_record("a.cpp", &root);
        assert_eq!(record.includes.len(), 1); // only the file's own path
    }

    #[test]
    fn changed_unit_names_filter_by_position() {
        let xml = br#"<unit>
            <function pos:line="1"><type><name pos:line="1">void</name></type> <name pos:line="1">early</name>
            <parameter_list>()</parameter_list><block pos:line="1">{ }</block></function>
            <function pos:line="10"><type><name pos:line="10">void</name></type> <name pos:line="10">late</name>
            <parameter_list>()</parameter_list><block pos:line="10">{ }</block></function>
        </unit>"#;
        let root = parse(xml);
        let ranges = vec![LineRange::new(10, 1)];
        let names = extract_changed_unit_names(&root, &ranges);
        assert!(names.contains("late"));
        assert!(!names.contains("early"));
    }
}
