// SPDX-License-Identifier: (MIT OR Apache-2.0)

//! MIR function representation - control-flow graph of basic blocks.

use spmd_ast::{ScalarType, Span};
use spmd_types::SignatureKind;

use crate::{MirStmt, MirTerminator, MirType};

#[derive(Debug, Clone)]
pub struct MirFunction {
    pub name: String,
    pub kind: SignatureKind,
    /// Effective lane count, `None` for purely scalar functions.
    pub lanes: Option<u32>,
    /// For SPMD functions, `params[0]` is the `__mask` parameter.
    pub params: Vec<MirLocal>,
    pub ret_ty: MirType,
    pub locals: Vec<MirLocal>,
    pub blocks: Vec<MirBlock>,
    pub entry_block: BlockId,
    /// Data-parallel loops, in source order.
    pub loops: Vec<LoopDescriptor>,
}

impl MirFunction {
    pub fn local(&self, id: LocalId) -> Option<&MirLocal> {
        self.locals.get(id.0 as usize)
    }

    pub fn block(&self, id: BlockId) -> Option<&MirBlock> {
        self.blocks.get(id.0 as usize)
    }

    pub fn local_named(&self, name: &str) -> Option<&MirLocal> {
        self.locals.iter().find(|l| l.name.as_deref() == Some(name))
    }

    /// All statements, block by block.
    pub fn statements(&self) -> impl Iterator<Item = &MirStmt> {
        self.blocks.iter().flat_map(|b| b.statements.iter())
    }

    pub fn mask_param(&self) -> Option<&MirLocal> {
        if self.kind.is_spmd() {
            self.params.first()
        } else {
            None
        }
    }
}

#[derive(Debug, Clone)]
pub struct MirBlock {
    pub id: BlockId,
    pub statements: Vec<MirStmt>,
    pub terminator: MirTerminator,
}

#[derive(Debug, Clone)]
pub struct MirLocal {
    pub id: LocalId,
    pub name: Option<String>,
    pub ty: MirType,
    pub is_param: bool,
}

/// Shape of a vectorized loop, recorded for the code generator.
#[derive(Debug, Clone, PartialEq)]
pub struct LoopDescriptor {
    pub header: BlockId,
    pub exit: BlockId,
    pub index_elem: ScalarType,
    pub lanes: u32,
    /// Iterations mask off lanes at or past `end`.
    pub needs_tail_mask: bool,
    /// Known when both bounds are literals.
    pub trip_count: Option<i64>,
    pub nested_in_data_parallel: bool,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LocalId(pub u32);
