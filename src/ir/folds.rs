//! Fold-scope extraction.
//!
//! Splits a raw block stream into the blocks of each `@fold` scope and the
//! remaining main-traversal blocks. Blocks between a `Fold` and its matching
//! `Unfold` belong to that scope; the `Fold`/`Unfold` markers themselves are
//! consumed.

use crate::error::LoweringError;
use crate::ir::blocks::Block;
use crate::ir::location::FoldScopeLocation;
use indexmap::IndexMap;

/// Blocks of each fold scope, in the order the scopes appear in the stream.
pub type FoldsMapping = IndexMap<FoldScopeLocation, Vec<Block>>;

/// Extract fold scopes from a raw block stream.
///
/// Returns `(folds, remaining_blocks)`. Nested folds, an `Unfold` outside a
/// fold, a fold scope opened twice, or a fold left open at the end of the
/// stream are malformed IR.
pub fn extract_folds_from_ir_blocks(
    blocks: &[Block],
) -> Result<(FoldsMapping, Vec<Block>), LoweringError> {
    let mut folds = FoldsMapping::new();
    let mut remaining = Vec::with_capacity(blocks.len());
    let mut current: Option<(FoldScopeLocation, Vec<Block>)> = None;

    for (index, block) in blocks.iter().enumerate() {
        match block {
            Block::Fold(fold) => {
                if current.is_some() {
                    return Err(LoweringError::malformed_at(
                        index,
                        block,
                        "Fold block encountered inside another fold scope",
                    ));
                }
                if folds.contains_key(&fold.fold_scope_location) {
                    return Err(LoweringError::malformed_at(
                        index,
                        block,
                        "fold scope location opened more than once",
                    ));
                }
                current = Some((fold.fold_scope_location.clone(), Vec::new()));
            }
            Block::Unfold => match current.take() {
                Some((location, folded)) => {
                    folds.insert(location, folded);
                }
                None => {
                    return Err(LoweringError::malformed_at(
                        index,
                        block,
                        "Unfold block encountered outside a fold scope",
                    ));
                }
            },
            other => match current.as_mut() {
                Some((_, folded)) => folded.push(other.clone()),
                None => remaining.push(other.clone()),
            },
        }
    }

    if let Some((location, _)) = current {
        return Err(LoweringError::malformed_shape(
            location,
            "fold scope was never closed by an Unfold block",
        ));
    }

    Ok((folds, remaining))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::expressions::{BinaryOperator, Expression};
    use crate::ir::location::{EdgeDirection, Location};

    fn fold_scope() -> FoldScopeLocation {
        FoldScopeLocation::new(Location::root("Animal"), EdgeDirection::Out, "ParentOf")
    }

    #[test]
    fn test_no_folds_passes_stream_through() {
        let root = Location::root("Animal");
        let blocks = vec![
            Block::query_root("Animal"),
            Block::mark_location(&root),
            Block::GlobalOperationsStart,
        ];
        let (folds, remaining) = extract_folds_from_ir_blocks(&blocks).unwrap();
        assert!(folds.is_empty());
        assert_eq!(remaining, blocks);
    }

    #[test]
    fn test_fold_blocks_are_removed_from_main_stream() {
        let root = Location::root("Animal");
        let folded_filter = Block::filter(Expression::binary(
            BinaryOperator::Gt,
            Expression::local_field("net_worth"),
            Expression::literal(10),
        ));
        let blocks = vec![
            Block::query_root("Animal"),
            Block::mark_location(&root),
            Block::fold(fold_scope()),
            Block::traverse(EdgeDirection::Out, "ParentOf"),
            folded_filter.clone(),
            Block::Unfold,
            Block::GlobalOperationsStart,
        ];
        let (folds, remaining) = extract_folds_from_ir_blocks(&blocks).unwrap();

        assert_eq!(folds.len(), 1);
        assert_eq!(
            folds[&fold_scope()],
            vec![Block::traverse(EdgeDirection::Out, "ParentOf"), folded_filter]
        );
        assert_eq!(
            remaining,
            vec![
                Block::query_root("Animal"),
                Block::mark_location(&root),
                Block::GlobalOperationsStart,
            ]
        );
    }

    #[test]
    fn test_nested_fold_is_malformed() {
        let blocks = vec![
            Block::fold(fold_scope()),
            Block::fold(fold_scope()),
            Block::Unfold,
        ];
        let err = extract_folds_from_ir_blocks(&blocks).unwrap_err();
        assert!(matches!(
            err,
            LoweringError::MalformedIr {
                position: Some(1),
                ..
            }
        ));
    }

    #[test]
    fn test_unfold_without_fold_is_malformed() {
        let err = extract_folds_from_ir_blocks(&[Block::Unfold]).unwrap_err();
        assert!(matches!(
            err,
            LoweringError::MalformedIr {
                position: Some(0),
                ..
            }
        ));
    }

    #[test]
    fn test_unclosed_fold_is_malformed() {
        let err = extract_folds_from_ir_blocks(&[Block::fold(fold_scope())]).unwrap_err();
        assert!(err.to_string().contains("never closed"));
    }

    #[test]
    fn test_repeated_fold_scope_is_malformed() {
        let blocks = vec![
            Block::fold(fold_scope()),
            Block::Unfold,
            Block::fold(fold_scope()),
            Block::Unfold,
        ];
        let err = extract_folds_from_ir_blocks(&blocks).unwrap_err();
        assert!(err.to_string().contains("more than once"));
    }
}
