//! Step assembly: grouping a flat IR block stream into pattern-matching steps.
//!
//! The stream is consumed in a single left-to-right pass by a small state
//! machine:
//!
//! ```text
//! AwaitingRoot --QueryRoot--> BuildingStep --GlobalOperationsStart--> AwaitingGlobalOps
//!                               ^      |                                 |      |
//!                               +------+ Traverse / Recurse              |   Filter (once)
//!                                        (finish step, open next)        v
//!                                                                 Done <-- ConstructResult
//! ```
//!
//! Each finished step buffer must have one of the exact shapes
//!
//! ```text
//! [QueryRoot, MarkLocation]
//! [QueryRoot, Filter, MarkLocation]
//! [Traverse | Recurse, CoerceType, MarkLocation]
//! [Traverse | Recurse, CoerceType, Filter, MarkLocation]
//! ```
//!
//! and the global operations section must be `[ConstructResult]` or
//! `[Filter, ConstructResult]`. Anything else is malformed IR: a defect in
//! the upstream lowering passes, reported with the offending block and its
//! position in the (fold-extracted) stream.

use crate::cypher::query::{CypherQuery, CypherStep, StepBlock, TypeHierarchy};
use crate::error::LoweringError;
use crate::ir::{
    Block, ConstructResult, DisplayBlocks, Filter, FoldsMapping, Location,
    extract_folds_from_ir_blocks,
};
use std::collections::{BTreeSet, HashSet};
use tracing::{debug, trace};

/// Convert a raw IR block stream into a [`CypherQuery`].
///
/// Fold scopes are extracted first; the remaining stream is assembled into
/// steps. Never returns a partial result.
pub fn convert_to_cypher_query<H: TypeHierarchy + ?Sized>(
    ir_blocks: &[Block],
    type_hierarchy: &H,
) -> Result<CypherQuery, LoweringError> {
    let (folds, remaining) = extract_folds_from_ir_blocks(ir_blocks)?;
    assemble_steps(&remaining, folds, type_hierarchy)
}

/// Assemble an already fold-extracted block stream into a [`CypherQuery`].
pub fn assemble_steps<H: TypeHierarchy + ?Sized>(
    blocks: &[Block],
    folds: FoldsMapping,
    type_hierarchy: &H,
) -> Result<CypherQuery, LoweringError> {
    let mut assembler = StepAssembler::new(type_hierarchy);
    let mut state = AssemblyState::AwaitingRoot;
    for (index, block) in blocks.iter().enumerate() {
        trace!(index, block = %block, "assembling block");
        state = assembler.transition(state, index, block)?;
    }

    let (global_where_block, output_block) = match state {
        AssemblyState::Done {
            global_filter,
            output,
        } => (global_filter, output),
        AssemblyState::AwaitingRoot => {
            return Err(LoweringError::malformed_shape(
                DisplayBlocks(blocks),
                "empty IR: no QueryRoot block was found",
            ));
        }
        AssemblyState::BuildingStep(_) => {
            return Err(LoweringError::malformed_shape(
                DisplayBlocks(blocks),
                "no GlobalOperationsStart block was found",
            ));
        }
        AssemblyState::AwaitingGlobalOps { .. } => {
            return Err(LoweringError::malformed_shape(
                DisplayBlocks(blocks),
                "global operations must end with a ConstructResult block",
            ));
        }
    };

    debug!(
        steps = assembler.steps.len(),
        folds = folds.len(),
        global_filter = global_where_block.is_some(),
        "assembled pattern-matching query"
    );

    Ok(CypherQuery {
        steps: assembler.steps,
        folds,
        global_where_block,
        output_block,
    })
}

/// Grammar state of the assembly pass.
#[derive(Debug)]
enum AssemblyState {
    /// Nothing consumed yet; only `QueryRoot` is accepted.
    AwaitingRoot,
    /// Inside the pattern-matching section, accumulating one step.
    BuildingStep(StepBuffer),
    /// After `GlobalOperationsStart`.
    AwaitingGlobalOps { global_filter: Option<Filter> },
    /// `ConstructResult` consumed; nothing may follow.
    Done {
        global_filter: Option<Filter>,
        output: ConstructResult,
    },
}

/// Blocks of the step currently being built.
#[derive(Debug)]
struct StepBuffer {
    /// Stream position of the opening block.
    start: usize,
    blocks: Vec<Block>,
}

impl StepBuffer {
    fn open(start: usize, block: &Block) -> Self {
        StepBuffer {
            start,
            blocks: vec![block.clone()],
        }
    }
}

/// Location linkage threaded between steps.
#[derive(Debug, Default)]
struct LinkState {
    /// Attached to the step currently being built.
    linked_location: Option<Location>,
    /// Attached to the next step that gets opened.
    next_linked_location: Option<Location>,
}

impl LinkState {
    fn record(&mut self, location: &Location) {
        self.next_linked_location = Some(location.clone());
    }

    /// Take the link of the finished step and promote the pending link to
    /// the step about to be opened.
    fn advance(&mut self) -> Option<Location> {
        let finished = self.linked_location.take();
        self.linked_location = self.next_linked_location.take();
        finished
    }

    /// Take the link of the final step.
    fn finish(&mut self) -> Option<Location> {
        self.linked_location.take()
    }
}

struct StepAssembler<'a, H: ?Sized> {
    type_hierarchy: &'a H,
    links: LinkState,
    steps: Vec<CypherStep>,
    bound_locations: HashSet<Location>,
}

impl<'a, H: TypeHierarchy + ?Sized> StepAssembler<'a, H> {
    fn new(type_hierarchy: &'a H) -> Self {
        StepAssembler {
            type_hierarchy,
            links: LinkState::default(),
            steps: Vec::new(),
            bound_locations: HashSet::new(),
        }
    }

    fn transition(
        &mut self,
        state: AssemblyState,
        index: usize,
        block: &Block,
    ) -> Result<AssemblyState, LoweringError> {
        match state {
            AssemblyState::AwaitingRoot => match block {
                Block::QueryRoot(_) => Ok(AssemblyState::BuildingStep(StepBuffer::open(
                    index, block,
                ))),
                _ => Err(LoweringError::malformed_at(
                    index,
                    block,
                    "the first block of the IR must be QueryRoot",
                )),
            },

            AssemblyState::BuildingStep(mut buffer) => match block {
                Block::QueryRoot(_) => Err(LoweringError::malformed_at(
                    index,
                    block,
                    "encountered a QueryRoot block that was not the first block in the IR",
                )),
                Block::Traverse(_) | Block::Recurse(_) => {
                    let linked = self.links.advance();
                    self.finish_step(linked, buffer)?;
                    Ok(AssemblyState::BuildingStep(StepBuffer::open(index, block)))
                }
                Block::Backtrack(backtrack) => {
                    self.links.record(&backtrack.location);
                    Ok(AssemblyState::BuildingStep(buffer))
                }
                Block::MarkLocation(mark) => {
                    self.links.record(&mark.location);
                    buffer.blocks.push(block.clone());
                    Ok(AssemblyState::BuildingStep(buffer))
                }
                Block::Filter(_) | Block::CoerceType(_) => {
                    buffer.blocks.push(block.clone());
                    Ok(AssemblyState::BuildingStep(buffer))
                }
                // No structural effect on the step sequence.
                Block::Unfold | Block::OutputSource | Block::EndOptional => {
                    Ok(AssemblyState::BuildingStep(buffer))
                }
                Block::GlobalOperationsStart => {
                    let linked = self.links.finish();
                    self.finish_step(linked, buffer)?;
                    Ok(AssemblyState::AwaitingGlobalOps {
                        global_filter: None,
                    })
                }
                Block::Fold(_) => Err(LoweringError::malformed_at(
                    index,
                    block,
                    "Fold blocks must be extracted before step assembly",
                )),
                Block::ConstructResult(_) => Err(LoweringError::malformed_at(
                    index,
                    block,
                    "ConstructResult encountered before GlobalOperationsStart",
                )),
            },

            AssemblyState::AwaitingGlobalOps { global_filter } => match block {
                Block::Filter(filter) if global_filter.is_none() => {
                    Ok(AssemblyState::AwaitingGlobalOps {
                        global_filter: Some(filter.clone()),
                    })
                }
                Block::ConstructResult(output) => Ok(AssemblyState::Done {
                    global_filter,
                    output: output.clone(),
                }),
                _ => Err(LoweringError::malformed_at(
                    index,
                    block,
                    "global operations must be [ConstructResult] or [Filter, ConstructResult]",
                )),
            },

            AssemblyState::Done { .. } => Err(LoweringError::malformed_at(
                index,
                block,
                "no blocks may follow ConstructResult",
            )),
        }
    }

    fn finish_step(
        &mut self,
        linked_location: Option<Location>,
        buffer: StepBuffer,
    ) -> Result<(), LoweringError> {
        let step = make_cypher_step(self.type_hierarchy, linked_location, buffer)?;

        if let Some(linked) = &step.linked_location
            && !self.bound_locations.contains(linked)
        {
            return Err(LoweringError::malformed_shape(
                linked,
                "step is linked to a location that no earlier step binds",
            ));
        }
        if !self.bound_locations.insert(step.bound_location().clone()) {
            return Err(LoweringError::malformed_shape(
                step.bound_location(),
                "location is bound by more than one step",
            ));
        }

        trace!(
            location = %step.bound_location(),
            linked = ?step.linked_location.as_ref().map(Location::name),
            "finished step"
        );
        self.steps.push(step);
        Ok(())
    }
}

/// Reduce a finished step buffer to a [`CypherStep`] by its exact block shape.
fn make_cypher_step<H: TypeHierarchy + ?Sized>(
    type_hierarchy: &H,
    linked_location: Option<Location>,
    buffer: StepBuffer,
) -> Result<CypherStep, LoweringError> {
    let StepBuffer { start, blocks } = buffer;
    let shape_error = |reason: &str| LoweringError::MalformedIr {
        position: Some(start),
        block: DisplayBlocks(&blocks).to_string(),
        reason: reason.to_string(),
    };

    let (step_block, type_names, where_block, as_block) = match blocks.as_slice() {
        [Block::QueryRoot(root), Block::MarkLocation(mark)] => {
            (StepBlock::QueryRoot(root.clone()), &root.start_types, None, mark)
        }
        [Block::QueryRoot(root), Block::Filter(filter), Block::MarkLocation(mark)] => (
            StepBlock::QueryRoot(root.clone()),
            &root.start_types,
            Some(filter),
            mark,
        ),
        [opening, Block::CoerceType(coerce), Block::MarkLocation(mark)] => (
            traversal_step_block(opening)
                .ok_or_else(|| shape_error("unexpected block types for a traversal step"))?,
            &coerce.target_types,
            None,
            mark,
        ),
        [
            opening,
            Block::CoerceType(coerce),
            Block::Filter(filter),
            Block::MarkLocation(mark),
        ] => (
            traversal_step_block(opening)
                .ok_or_else(|| shape_error("unexpected block types for a traversal step"))?,
            &coerce.target_types,
            Some(filter),
            mark,
        ),
        _ => return Err(shape_error("unexpected block types for a step")),
    };

    let exact_type = only_type(type_names)
        .ok_or_else(|| shape_error("a step must name exactly one exact type"))?;
    let step_types = type_hierarchy.supertypes_of_exact_type(exact_type);

    Ok(CypherStep {
        linked_location,
        step_block,
        step_types,
        where_block: where_block.cloned(),
        as_block: as_block.clone(),
    })
}

fn traversal_step_block(block: &Block) -> Option<StepBlock> {
    match block {
        Block::Traverse(traverse) => Some(StepBlock::Traverse(traverse.clone())),
        Block::Recurse(recurse) => Some(StepBlock::Recurse(recurse.clone())),
        _ => None,
    }
}

fn only_type(types: &BTreeSet<String>) -> Option<&str> {
    match types.len() {
        1 => types.iter().next().map(String::as_str),
        _ => None,
    }
}
