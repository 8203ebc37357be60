//! Low-level tree primitives over the rcdom node graph.

use std::cell::RefCell;
use std::rc::Rc;

use markup5ever_rcdom::{Handle, Node, NodeData};

/// Whether `node` is an element with the given local name (ASCII case-insensitive).
pub(crate) fn is_element(node: &Handle, tag: &str) -> bool {
    match &node.data {
        NodeData::Element { name, .. } => {
            let local: &str = &name.local;
            local.eq_ignore_ascii_case(tag)
        }
        _ => false,
    }
}

/// Collect every element named `tag` below `root`, in document order.
///
/// `<template>` contents are searched as well, since html5ever keeps them in a
/// separate fragment rather than in the children list.
pub(crate) fn find_elements(root: &Handle, tag: &str) -> Vec<Handle> {
    let mut found = Vec::new();
    collect(root, tag, &mut found);
    found
}

fn collect(node: &Handle, tag: &str, found: &mut Vec<Handle>) {
    for child in node.children.borrow().iter() {
        if is_element(child, tag) {
            found.push(child.clone());
        }
        collect(child, tag, found);
    }

    if let NodeData::Element {
        template_contents, ..
    } = &node.data
    {
        if let Some(contents) = template_contents.borrow().as_ref() {
            collect(contents, tag, found);
        }
    }
}

/// Parent of `node`, if it is still attached to a tree.
pub(crate) fn parent_of(node: &Handle) -> Option<Handle> {
    let weak = node.parent.take()?;
    let parent = weak.upgrade();
    node.parent.set(Some(weak));
    parent
}

/// Append `child` as the last child of `parent`.
pub(crate) fn append(parent: &Handle, child: Handle) {
    child.parent.set(Some(Rc::downgrade(parent)));
    parent.children.borrow_mut().push(child);
}

/// Replace `target` in its parent's child list with `replacements`, in order.
///
/// Returns `false` if `target` has no parent.
pub(crate) fn replace_with(target: &Handle, replacements: Vec<Handle>) -> bool {
    let Some(parent) = parent_of(target) else {
        return false;
    };

    let mut children = parent.children.borrow_mut();
    let Some(index) = children.iter().position(|c| Rc::ptr_eq(c, target)) else {
        return false;
    };

    for node in &replacements {
        node.parent.set(Some(Rc::downgrade(&parent)));
    }
    children.splice(index..=index, replacements);
    target.parent.set(None);
    true
}

/// Deep copy of `node` and its subtree, detached from any parent.
pub(crate) fn deep_clone(node: &Handle) -> Handle {
    let data = match &node.data {
        NodeData::Document => NodeData::Document,
        NodeData::Doctype {
            name,
            public_id,
            system_id,
        } => NodeData::Doctype {
            name: name.clone(),
            public_id: public_id.clone(),
            system_id: system_id.clone(),
        },
        NodeData::Text { contents } => NodeData::Text {
            contents: RefCell::new(contents.borrow().clone()),
        },
        NodeData::Comment { contents } => NodeData::Comment {
            contents: contents.clone(),
        },
        NodeData::Element {
            name,
            attrs,
            template_contents,
            mathml_annotation_xml_integration_point,
        } => NodeData::Element {
            name: name.clone(),
            attrs: RefCell::new(attrs.borrow().clone()),
            template_contents: RefCell::new(template_contents.borrow().as_ref().map(deep_clone)),
            mathml_annotation_xml_integration_point: *mathml_annotation_xml_integration_point,
        },
        NodeData::ProcessingInstruction { target, contents } => {
            NodeData::ProcessingInstruction {
                target: target.clone(),
                contents: contents.clone(),
            }
        }
    };

    let copy = Node::new(data);
    for child in node.children.borrow().iter() {
        append(&copy, deep_clone(child));
    }
    copy
}

/// Deep copies of every child of `parent`, in order.
pub(crate) fn clone_children(parent: &Handle) -> Vec<Handle> {
    parent.children.borrow().iter().map(deep_clone).collect()
}

/// Detach and return every child of `parent`, in order.
pub(crate) fn take_children(parent: &Handle) -> Vec<Handle> {
    let children: Vec<Handle> = parent.children.borrow_mut().drain(..).collect();
    for child in &children {
        child.parent.set(None);
    }
    children
}
