//! Cell lookup: global cell index / name -> atlas rectangle and origin.
//!
//! Cell indices are global across the project, in cell-map order, which is
//! how keyframed cell indices address them.

use hashbrown::HashMap;

use crate::data::{Cell, CellMap, ProjectData};

/// One resolved cell and the atlas it belongs to.
#[derive(Clone, Copy, Debug)]
pub struct CellEntry<'a> {
    pub index: usize,
    pub cell: &'a Cell,
    pub map: &'a CellMap,
}

impl CellEntry<'_> {
    /// Source pixel size.
    #[inline]
    pub fn size(&self) -> [f32; 2] {
        [self.cell.width, self.cell.height]
    }

    /// Normalized (left, top, right, bottom) rectangle inside the atlas.
    pub fn uv_rect(&self) -> [f32; 4] {
        let w = if self.map.width > 0.0 { self.map.width } else { 1.0 };
        let h = if self.map.height > 0.0 { self.map.height } else { 1.0 };
        [
            self.cell.x / w,
            self.cell.y / h,
            (self.cell.x + self.cell.width) / w,
            (self.cell.y + self.cell.height) / h,
        ]
    }
}

#[derive(Debug, Default)]
pub struct CellTable<'a> {
    entries: Vec<CellEntry<'a>>,
    by_name: HashMap<String, usize>,
}

impl<'a> CellTable<'a> {
    pub fn new(project: &'a ProjectData) -> Self {
        let mut entries = Vec::new();
        let mut by_name = HashMap::new();
        for map in &project.cell_maps {
            for cell in &map.cells {
                let index = entries.len();
                entries.push(CellEntry { index, cell, map });
                by_name.insert(format!("{}/{}", map.name, cell.name), index);
                // Bare names resolve to the first cell that uses them.
                by_name.entry(cell.name.clone()).or_insert(index);
            }
        }
        Self { entries, by_name }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Lookup by global index. Negative indices never match.
    pub fn get(&self, index: i32) -> Option<CellEntry<'a>> {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.entries.get(i))
            .copied()
    }

    /// Lookup by `"map/cell"` or bare cell name.
    pub fn find(&self, name: &str) -> Option<CellEntry<'a>> {
        self.by_name.get(name).map(|&i| self.entries[i])
    }
}
