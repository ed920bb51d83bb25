//! Execution of operations against a [`Tree`].
//!
//! Every operation is validated in full before the tree is touched, so a
//! failing operation leaves the tree as it was.

use super::{
    AttributeOperation, InsertOperation, MergeOperation, MoveOperation, Operation, OperationKind,
    RenameOperation, SplitOperation,
};
use crate::errors::{EditorError, EditorResult};
use scribe_model::{Element, ModelError, Node, Tree};

/// Every check `apply` relies on
pub(crate) fn validate(tree: &Tree, operation: &Operation) -> EditorResult<()> {
    operation.validate()?;
    validate_in_tree(tree, operation)
}

/// Apply an operation that passed [`validate`]
pub(crate) fn apply(tree: &mut Tree, operation: &Operation) -> EditorResult<()> {
    match &operation.kind {
        OperationKind::Insert(op) => apply_insert(tree, op),
        OperationKind::Move(op) => apply_move(tree, op),
        OperationKind::Split(op) => apply_split(tree, op),
        OperationKind::Merge(op) => apply_merge(tree, op),
        OperationKind::Rename(op) => apply_rename(tree, op),
        OperationKind::Attribute(op) => apply_attribute(tree, op),
        OperationKind::Marker(_) | OperationKind::NoOp => Ok(()),
    }
}

fn validate_in_tree(tree: &Tree, operation: &Operation) -> EditorResult<()> {
    match &operation.kind {
        OperationKind::Insert(op) => {
            tree.validate_position(&op.position)?;
        }

        OperationKind::Move(op) => {
            tree.validate_flat_range(&op.source_range())?;
            tree.validate_position(&op.target_position)?;
        }

        OperationKind::Split(op) => {
            if op.split_position.path.len() < 2 {
                return Err(EditorError::invalid_operation("cannot split a root element"));
            }
            tree.validate_position(&op.split_position)?;
            let max = tree.parent_of(&op.split_position)?.max_offset();
            if op.split_position.offset() + op.how_many != max {
                return Err(EditorError::invalid_operation(format!(
                    "split moves {} offsets but {} follow the split position",
                    op.how_many,
                    max - op.split_position.offset()
                )));
            }
            tree.validate_position(&op.insertion_position)?;
            if let Some(graveyard) = &op.graveyard_position {
                match tree.node_after(graveyard) {
                    Some(Node::Element(_)) => {}
                    _ => {
                        return Err(EditorError::invalid_operation(
                            "split graveyard position does not hold an element",
                        ))
                    }
                }
            }
        }

        OperationKind::Merge(op) => {
            let deletion = op.deletion_position();
            if deletion.path.is_empty() {
                return Err(EditorError::invalid_operation("cannot merge a root element"));
            }
            let merged = tree.parent_of(&op.source_position)?;
            if merged.max_offset() != op.how_many {
                return Err(EditorError::invalid_operation(format!(
                    "merge moves {} offsets but the merged element holds {}",
                    op.how_many,
                    merged.max_offset()
                )));
            }
            tree.validate_position(&op.target_position)?;
            if op.target_position.root == deletion.root
                && op.target_position.path.starts_with(&deletion.path)
            {
                return Err(EditorError::invalid_operation(
                    "merge target is inside the merged element",
                ));
            }
            tree.validate_position(&op.graveyard_position)?;
        }

        OperationKind::Rename(op) => match tree.node_after(&op.position) {
            Some(Node::Element(element)) if element.name == op.old_name => {}
            Some(Node::Element(element)) => {
                return Err(EditorError::invalid_operation(format!(
                    "rename expects element '{}' but found '{}'",
                    op.old_name, element.name
                )))
            }
            _ => {
                return Err(ModelError::NotAnElement {
                    root: op.position.root.clone(),
                    path: op.position.path.clone(),
                }
                .into())
            }
        },

        OperationKind::Attribute(op) => {
            for (_, value) in tree.attribute_runs(&op.range, &op.key)? {
                if value != op.old_value {
                    return Err(EditorError::invalid_operation(format!(
                        "attribute '{}' has value {:?}, expected {:?}",
                        op.key, value, op.old_value
                    )));
                }
            }
        }

        OperationKind::Marker(_) | OperationKind::NoOp => {}
    }
    Ok(())
}

fn apply_insert(tree: &mut Tree, op: &InsertOperation) -> EditorResult<()> {
    tree.insert(&op.position, op.nodes.clone())?;
    Ok(())
}

fn apply_move(tree: &mut Tree, op: &MoveOperation) -> EditorResult<()> {
    let nodes = tree.remove(&op.source_position, op.how_many)?;
    tree.insert(&op.insertion_position(), nodes)?;
    Ok(())
}

fn apply_split(tree: &mut Tree, op: &SplitOperation) -> EditorResult<()> {
    let nodes = tree.remove(&op.split_position, op.how_many)?;

    let (mut element, insertion) = match &op.graveyard_position {
        Some(graveyard) => {
            let element = match tree.remove(graveyard, 1)?.pop() {
                Some(Node::Element(element)) => element,
                _ => {
                    return Err(EditorError::invalid_operation(
                        "split graveyard position does not hold an element",
                    ))
                }
            };
            let insertion = op
                .insertion_position
                .transformed_by_deletion(graveyard, 1)
                .unwrap_or_else(|| op.insertion_position.clone());
            (element, insertion)
        }
        None => {
            let split_element = tree.parent_of(&op.split_position)?;
            let mut clone = Element::new(split_element.name.clone());
            clone.attributes = split_element.attributes.clone();
            (clone, op.insertion_position.clone())
        }
    };

    element.insert_at(element.max_offset(), nodes)?;
    tree.insert(&insertion, vec![Node::element(element)])?;
    Ok(())
}

fn apply_merge(tree: &mut Tree, op: &MergeOperation) -> EditorResult<()> {
    let nodes = tree.remove(&op.source_position, op.how_many)?;
    tree.insert(&op.target_position, nodes)?;

    let deletion = op
        .deletion_position()
        .transformed_by_insertion(&op.target_position, op.how_many);
    let merged = tree.remove(&deletion, 1)?;
    let graveyard = op
        .graveyard_position
        .transformed_by_deletion(&deletion, 1)
        .unwrap_or_else(|| op.graveyard_position.clone());
    tree.insert(&graveyard, merged)?;
    Ok(())
}

fn apply_rename(tree: &mut Tree, op: &RenameOperation) -> EditorResult<()> {
    let element = tree.element_at_mut(&op.position.root, &op.position.path)?;
    element.name = op.new_name.clone();
    Ok(())
}

fn apply_attribute(tree: &mut Tree, op: &AttributeOperation) -> EditorResult<()> {
    if op.range.is_collapsed() {
        return Ok(());
    }
    tree.set_attribute(&op.range, &op.key, op.new_value.as_ref())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use scribe_model::{Position, Range};
    use serde_json::json;

    fn execute(tree: &mut Tree, operation: &Operation) -> EditorResult<()> {
        validate(tree, operation)?;
        apply(tree, operation)
    }

    fn pos(path: &[usize]) -> Position {
        Position::new("main", path.to_vec())
    }

    fn tree(paragraphs: &[&str]) -> Tree {
        let mut tree = Tree::new();
        tree.add_root(
            Element::new("main").with_children(
                paragraphs
                    .iter()
                    .map(|text| {
                        Node::element(Element::new("paragraph").with_children(vec![Node::text(*text)]))
                    })
                    .collect(),
            ),
        );
        tree
    }

    fn texts(tree: &Tree) -> Vec<String> {
        tree.root("main")
            .unwrap()
            .children()
            .iter()
            .filter_map(Node::as_element)
            .map(Element::text)
            .collect()
    }

    #[test]
    fn test_split_and_merge_round_trip() {
        let mut tree = tree(&["abcdef"]);
        let split = Operation::split(0, pos(&[0, 3]), 3, None);
        execute(&mut tree, &split).unwrap();
        assert_eq!(texts(&tree), vec!["abc", "def"]);

        execute(&mut tree, &split.reversed()).unwrap();
        assert_eq!(texts(&tree), vec!["abcdef"]);
        assert_eq!(tree.root("$graveyard").unwrap().children().len(), 1);
    }

    #[test]
    fn test_merge_reversal_reuses_graveyard_element() {
        let mut tree = tree(&["abc", "def"]);
        let merge = Operation::merge(0, pos(&[1, 0]), 3, pos(&[0, 3]), Position::graveyard(0));
        execute(&mut tree, &merge).unwrap();
        assert_eq!(texts(&tree), vec!["abcdef"]);

        execute(&mut tree, &merge.reversed()).unwrap();
        assert_eq!(texts(&tree), vec!["abc", "def"]);
        assert!(tree.root("$graveyard").unwrap().children().is_empty());
    }

    #[test]
    fn test_move_between_parents() {
        let mut tree = tree(&["abc", "def"]);
        let range = Range::new(pos(&[0, 0]), pos(&[0, 2])).unwrap();
        execute(&mut tree, &Operation::move_range(0, &range, pos(&[1, 3])).unwrap()).unwrap();
        assert_eq!(texts(&tree), vec!["c", "defab"]);
    }

    #[test]
    fn test_failed_validation_leaves_tree_untouched() {
        let mut tree = tree(&["abc"]);
        let before = tree.clone();

        let wrong_split = Operation::split(0, pos(&[0, 1]), 1, None);
        assert!(execute(&mut tree, &wrong_split).is_err());

        let wrong_rename = Operation::rename(0, pos(&[0]), "heading", "paragraph");
        assert!(execute(&mut tree, &wrong_rename).is_err());

        let range = Range::new(pos(&[0, 0]), pos(&[0, 1])).unwrap();
        let wrong_old_value = Operation::attribute(0, range, "bold", Some(json!(true)), None);
        assert!(execute(&mut tree, &wrong_old_value).is_err());

        assert_eq!(tree, before);
    }

    #[test]
    fn test_rename_and_attribute() {
        let mut tree = tree(&["abc"]);
        execute(&mut tree, &Operation::rename(0, pos(&[0]), "paragraph", "heading")).unwrap();
        assert_eq!(tree.element_at("main", &[0]).unwrap().name, "heading");

        let range = Range::new(pos(&[0, 1]), pos(&[0, 3])).unwrap();
        execute(&mut tree, &Operation::attribute(1, range.clone(), "bold", None, Some(json!(true)))).unwrap();
        let runs = tree.attribute_runs(&range, "bold").unwrap();
        assert_eq!(runs, vec![(range, Some(json!(true)))]);
    }
}
