// SPDX-License-Identifier: (MIT OR Apache-2.0)

//! BlockBuilder - helper for CFG construction during lowering.

use spmd_types::SignatureKind;

use crate::{
    BlockId, LocalId, LoopDescriptor, MirBlock, MirFunction, MirLocal, MirRValue, MirStmt,
    MirTerminator, MirType,
};

pub struct BlockBuilder {
    function: MirFunction,
    current_block: BlockId,
    next_local_id: u32,
    next_block_id: u32,
}

impl BlockBuilder {
    pub fn new(name: String, kind: SignatureKind, lanes: Option<u32>, ret_ty: MirType) -> Self {
        let entry_block = BlockId(0);
        let function = MirFunction {
            name,
            kind,
            lanes,
            params: Vec::new(),
            ret_ty,
            locals: Vec::new(),
            blocks: vec![MirBlock {
                id: entry_block,
                statements: Vec::new(),
                terminator: MirTerminator::Unreachable,
            }],
            entry_block,
            loops: Vec::new(),
        };

        Self {
            function,
            current_block: entry_block,
            next_local_id: 0,
            next_block_id: 1,
        }
    }

    pub fn create_block(&mut self) -> BlockId {
        let id = BlockId(self.next_block_id);
        self.next_block_id += 1;
        self.function.blocks.push(MirBlock {
            id,
            statements: Vec::new(),
            terminator: MirTerminator::Unreachable,
        });
        id
    }

    pub fn switch_to_block(&mut self, block: BlockId) {
        self.current_block = block;
    }

    pub fn current_block(&self) -> BlockId {
        self.current_block
    }

    fn push_local(&mut self, name: Option<String>, ty: MirType, is_param: bool) -> LocalId {
        let id = LocalId(self.next_local_id);
        self.next_local_id += 1;
        let local = MirLocal { id, name, ty, is_param };
        if is_param {
            self.function.params.push(local.clone());
        }
        self.function.locals.push(local);
        id
    }

    pub fn alloc_temp(&mut self, ty: MirType) -> LocalId {
        self.push_local(None, ty, false)
    }

    pub fn alloc_local(&mut self, name: String, ty: MirType) -> LocalId {
        self.push_local(Some(name), ty, false)
    }

    pub fn add_param(&mut self, name: String, ty: MirType) -> LocalId {
        self.push_local(Some(name), ty, true)
    }

    pub fn local_ty(&self, id: LocalId) -> &MirType {
        &self.function.locals[id.0 as usize].ty
    }

    pub fn push_stmt(&mut self, stmt: MirStmt) {
        let block = &mut self.function.blocks[self.current_block.0 as usize];
        block.statements.push(stmt);
    }

    /// Evaluate `rvalue` into a fresh temporary.
    pub fn emit(&mut self, ty: MirType, rvalue: MirRValue) -> LocalId {
        let dst = self.alloc_temp(ty);
        self.push_stmt(MirStmt::Assign { dst, rvalue });
        dst
    }

    pub fn assign(&mut self, dst: LocalId, rvalue: MirRValue) {
        self.push_stmt(MirStmt::Assign { dst, rvalue });
    }

    pub fn terminate(&mut self, term: MirTerminator) {
        let block = &mut self.function.blocks[self.current_block.0 as usize];
        block.terminator = term;
    }

    /// Check if the current block still has the default Unreachable terminator.
    pub fn current_block_unterminated(&self) -> bool {
        matches!(
            self.function.blocks[self.current_block.0 as usize].terminator,
            MirTerminator::Unreachable
        )
    }

    pub fn record_loop(&mut self, descriptor: LoopDescriptor) {
        self.function.loops.push(descriptor);
    }

    pub fn finish(self) -> MirFunction {
        self.function
    }
}
