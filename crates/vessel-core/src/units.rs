//! Units (parameter groups) and program lists.

use crate::types::{ProgramListId, UnitId, NO_PARENT_UNIT_ID, NO_PROGRAM_LIST_ID, ROOT_UNIT_ID};

/// A node in the unit tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unit {
    pub id: UnitId,
    pub parent_id: UnitId,
    pub name: &'static str,
    pub program_list_id: ProgramListId,
}

impl Unit {
    /// The root unit every plugin has.
    pub const ROOT: Self = Self {
        id: ROOT_UNIT_ID,
        parent_id: NO_PARENT_UNIT_ID,
        name: "Root",
        program_list_id: NO_PROGRAM_LIST_ID,
    };

    /// A unit under the root.
    pub const fn new(id: UnitId, name: &'static str) -> Self {
        Self {
            id,
            parent_id: ROOT_UNIT_ID,
            name,
            program_list_id: NO_PROGRAM_LIST_ID,
        }
    }

    pub const fn with_parent(mut self, parent_id: UnitId) -> Self {
        self.parent_id = parent_id;
        self
    }

    pub const fn with_program_list(mut self, program_list_id: ProgramListId) -> Self {
        self.program_list_id = program_list_id;
        self
    }
}

/// A named list of programs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramList {
    pub id: ProgramListId,
    pub name: &'static str,
    pub programs: &'static [&'static str],
}

impl ProgramList {
    pub const fn new(id: ProgramListId, name: &'static str, programs: &'static [&'static str]) -> Self {
        Self { id, name, programs }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.programs.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.programs.is_empty()
    }

    /// Name of the program at `index`.
    pub fn program_name(&self, index: i32) -> Option<&'static str> {
        usize::try_from(index).ok().and_then(|i| self.programs.get(i)).copied()
    }
}
