//! Tip-rack slot allocator.
//!
//! A rack is a rectangular grid of slots stored column-major, each either
//! holding a tip or empty. Every query and mutation works on contiguous runs
//! inside a single column, scanning from the top (row `A`) down; a run never
//! wraps into the next column.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::EngineError;

/// Rows are lettered, so a rack has at most this many.
pub const MAX_ROWS: usize = 26;

/// Zero-based (row, column) address of a slot.
///
/// Displays and parses as a well name: row letter then 1-based column,
/// e.g. row 1 column 0 is `"B1"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WellSlot {
    /// Row index, 0 is the top row `A`.
    pub row: usize,
    /// Column index, 0 is column `1`.
    pub column: usize,
}

impl WellSlot {
    /// Build a slot from zero-based coordinates.
    pub const fn new(row: usize, column: usize) -> Self {
        Self { row, column }
    }
}

impl fmt::Display for WellSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match u8::try_from(self.row).ok().filter(|r| (*r as usize) < MAX_ROWS) {
            Some(row) => write!(f, "{}{}", char::from(b'A' + row), self.column + 1),
            None => write!(f, "R{}C{}", self.row, self.column + 1),
        }
    }
}

impl FromStr for WellSlot {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || EngineError::InvalidSlot(s.to_owned());
        let mut chars = s.chars();
        let letter = chars.next().filter(char::is_ascii_uppercase).ok_or_else(invalid)?;
        let column: usize = chars.as_str().parse().map_err(|_| invalid())?;
        if column == 0 {
            return Err(invalid());
        }
        Ok(Self {
            row: (letter as usize) - ('A' as usize),
            column: column - 1,
        })
    }
}

/// Occupancy grid of one tip rack.
///
/// Owned by run-scoped state and passed by reference to the executors that
/// pick up or return tips.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TipResourceGrid {
    name: String,
    rows: usize,
    columns: usize,
    /// Column-major occupancy flags.
    has_tip: Vec<bool>,
}

impl TipResourceGrid {
    /// Create a full rack.
    pub fn new(name: impl Into<String>, rows: usize, columns: usize) -> Result<Self, EngineError> {
        if rows == 0 || columns == 0 || rows > MAX_ROWS {
            return Err(EngineError::InvalidConfig(format!(
                "tip rack must have 1-{MAX_ROWS} rows and at least one column, got {rows}x{columns}"
            )));
        }
        Ok(Self {
            name: name.into(),
            rows,
            columns,
            has_tip: vec![true; rows * columns],
        })
    }

    /// Rack display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of rows.
    pub const fn rows(&self) -> usize {
        self.rows
    }

    /// Number of columns.
    pub const fn columns(&self) -> usize {
        self.columns
    }

    /// Resolve a well name such as `"C4"` to a slot of this rack.
    pub fn slot(&self, well_name: &str) -> Result<WellSlot, EngineError> {
        let slot: WellSlot = well_name.parse()?;
        self.check(slot)?;
        Ok(slot)
    }

    /// Every slot in column-major order.
    pub fn wells(&self) -> Vec<WellSlot> {
        (0..self.columns)
            .flat_map(|column| (0..self.rows).map(move |row| WellSlot::new(row, column)))
            .collect()
    }

    /// Whether a slot holds a tip.
    pub fn has_tip(&self, slot: WellSlot) -> Result<bool, EngineError> {
        self.check(slot)?;
        Ok(self.occupied(slot.row, slot.column))
    }

    /// Overwrite the occupancy of one slot.
    pub fn set_has_tip(&mut self, slot: WellSlot, value: bool) -> Result<(), EngineError> {
        self.check(slot)?;
        let idx = self.index(slot.row, slot.column);
        self.has_tip[idx] = value;
        Ok(())
    }

    /// Refill every slot.
    pub fn reset(&mut self) {
        self.has_tip.fill(true);
    }

    /// Number of slots currently holding a tip.
    pub fn remaining(&self) -> usize {
        self.has_tip.iter().filter(|t| **t).count()
    }

    /// Top slot of the first column run of at least `count` tips.
    ///
    /// Columns are scanned left to right from `starting_slot`'s column; in that
    /// column, slots above `starting_slot` are ignored. In each column leading
    /// empty slots are skipped and the following unbroken run of tips must be
    /// long enough. A `count` of zero is treated as one.
    pub fn next_tip(&self, count: usize, starting_slot: Option<WellSlot>) -> Option<WellSlot> {
        let count = count.max(1);
        let start_column = starting_slot.map_or(0, |s| s.column);

        (start_column..self.columns).find_map(|column| {
            let first_row = match starting_slot {
                Some(s) if s.column == column => s.row,
                _ => 0,
            };
            let run_start = (first_row..self.rows).find(|&row| self.occupied(row, column))?;
            let run_len = (run_start..self.rows)
                .take_while(|&row| self.occupied(row, column))
                .count();
            (run_len >= count).then_some(WellSlot::new(run_start, column))
        })
    }

    /// Mark tips as picked up, starting at `start` and moving down its column.
    ///
    /// At most `count` slots are emptied, fewer if the column ends first. With
    /// `fail_if_partial`, every targeted slot must hold a tip or nothing is
    /// changed and [`EngineError::TipRackOutOfTips`] is returned.
    pub fn use_tips(
        &mut self,
        start: WellSlot,
        count: usize,
        fail_if_partial: bool,
    ) -> Result<(), EngineError> {
        self.check(start)?;
        let end = start.row + count.min(self.rows - start.row);

        if fail_if_partial {
            if let Some(row) = (start.row..end).find(|&row| !self.occupied(row, start.column)) {
                return Err(EngineError::TipRackOutOfTips {
                    rack: self.name.clone(),
                    slot: WellSlot::new(row, start.column).to_string(),
                });
            }
        }

        for row in start.row..end {
            let idx = self.index(row, start.column);
            self.has_tip[idx] = false;
        }
        tracing::debug!(rack = %self.name, start = %start, count = end - start.row, "tips used");
        Ok(())
    }

    /// Top slot of the first column gap of at least `count` empty slots.
    ///
    /// This is the inverse of [`next_tip`](Self::next_tip): in each column the
    /// leading run of tips is skipped and the following unbroken run of empty
    /// slots must be long enough. Used to find where tips were last taken from.
    pub fn previous_tip(&self, count: usize) -> Option<WellSlot> {
        let count = count.max(1);

        (0..self.columns).find_map(|column| {
            let gap_start = (0..self.rows).find(|&row| !self.occupied(row, column))?;
            let gap_len = (gap_start..self.rows)
                .take_while(|&row| !self.occupied(row, column))
                .count();
            (gap_len >= count).then_some(WellSlot::new(gap_start, column))
        })
    }

    /// Put tips back, starting at `start` and moving down its column.
    ///
    /// The run is clamped at the bottom of the column. Every targeted slot is
    /// checked before any is filled, so on
    /// [`EngineError::SlotAlreadyOccupied`] the rack is unchanged.
    pub fn return_tips(&mut self, start: WellSlot, count: usize) -> Result<(), EngineError> {
        self.check(start)?;
        let end = start.row + count.min(self.rows - start.row);

        if let Some(row) = (start.row..end).find(|&row| self.occupied(row, start.column)) {
            return Err(EngineError::SlotAlreadyOccupied {
                slot: WellSlot::new(row, start.column).to_string(),
            });
        }

        for row in start.row..end {
            let idx = self.index(row, start.column);
            self.has_tip[idx] = true;
        }
        tracing::debug!(rack = %self.name, start = %start, count = end - start.row, "tips returned");
        Ok(())
    }

    fn check(&self, slot: WellSlot) -> Result<(), EngineError> {
        if slot.row < self.rows && slot.column < self.columns {
            Ok(())
        } else {
            Err(EngineError::InvalidSlot(format!("{slot} is outside rack {}", self.name)))
        }
    }

    const fn index(&self, row: usize, column: usize) -> usize {
        column * self.rows + row
    }

    fn occupied(&self, row: usize, column: usize) -> bool {
        self.has_tip[self.index(row, column)]
    }
}

/// Pick the first rack, in order, that can serve `count` tips.
///
/// The search in the first rack begins at `starting_slot`; later racks are
/// searched from their first column. Returns the rack's index in `racks` and
/// the top slot of the run.
///
/// Fails with [`EngineError::InvalidSlot`] if `starting_slot` does not fit
/// the first rack.
pub fn select_tiprack_from_list(
    racks: &[TipResourceGrid],
    count: usize,
    starting_slot: Option<WellSlot>,
) -> Result<(usize, WellSlot), EngineError> {
    if let (Some(slot), Some(first)) = (starting_slot, racks.first()) {
        first.check(slot)?;
    }
    racks
        .iter()
        .enumerate()
        .find_map(|(idx, rack)| {
            let start = if idx == 0 { starting_slot } else { None };
            rack.next_tip(count, start).map(|slot| (idx, slot))
        })
        .ok_or_else(|| EngineError::TipRackOutOfTips {
            rack: racks.last().map_or_else(|| "<none>".to_owned(), |r| r.name.clone()),
            slot: "any".to_owned(),
        })
}
