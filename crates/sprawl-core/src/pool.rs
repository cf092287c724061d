//! Pre-allocated raster pools.
//!
//! All raster memory is allocated up front in three slot classes: input
//! slots (one per input layer, filled once at load time), per-worker
//! persistent slots (simulation state that survives across years within
//! one Monte Carlo realization) and per-worker scratch slots (checked out
//! and returned inside a single phase). Scratch checkouts return an
//! owning [`ScratchGrid`] guard that pushes the buffer back on drop, so a
//! release happens on every exit path by construction and double-free
//! cannot be expressed. Released scratch buffers are poisoned with the
//! invalid marker; [`WorkerPool::check_memory`] audits sentinels and
//! poison on every free buffer.

use crate::error::{SprawlError, SprawlResult};
use crate::grid::Grid;
use std::cell::RefCell;
use std::ops::{Deref, DerefMut};
use std::rc::Rc;

/// Pool of input-layer slots, drawn down once while loading.
#[derive(Debug)]
pub struct InputPool {
    rows: usize,
    cols: usize,
    free: Vec<Grid>,
}

impl InputPool {
    pub fn new(rows: usize, cols: usize, slots: usize) -> InputPool {
        let free = (0..slots).map(|_| Grid::new(rows, cols)).collect();
        InputPool { rows, cols, free }
    }

    /// Take one input slot. Exhaustion is fatal: the slot count is sized
    /// from the scenario's layer list, so running out means the loader and
    /// the scenario disagree.
    pub fn acquire(&mut self, tag: &str) -> SprawlResult<Grid> {
        self.free.pop().ok_or_else(|| {
            SprawlError::Pool(format!(
                "input pool exhausted acquiring '{tag}' ({}x{} slots all taken)",
                self.rows, self.cols
            ))
        })
    }

    pub fn remaining(&self) -> usize {
        self.free.len()
    }
}

#[derive(Debug)]
struct ScratchStack {
    free: Vec<Grid>,
    capacity: usize,
    min_free: usize,
    last_owner: &'static str,
    previous_owner: &'static str,
}

impl ScratchStack {
    fn pop(&mut self, tag: &'static str) -> SprawlResult<Grid> {
        let mut grid = self.free.pop().ok_or_else(|| {
            SprawlError::Pool(format!(
                "scratch stack underflow acquiring '{tag}' (capacity {})",
                self.capacity
            ))
        })?;
        self.min_free = self.min_free.min(self.free.len());
        self.previous_owner = self.last_owner;
        self.last_owner = tag;
        grid.check_sentinels()?;
        if cfg!(debug_assertions) && !grid.is_poisoned() {
            return Err(SprawlError::Pool(format!(
                "scratch buffer handed to '{tag}' was written after release by '{}'",
                self.previous_owner
            )));
        }
        grid.fill(0);
        Ok(grid)
    }

    fn push(&mut self, mut grid: Grid, tag: &'static str) {
        grid.poison();
        if let Err(err) = grid.check_sentinels() {
            // A corrupted guard band means an out-of-bounds write already
            // happened; continuing would corrupt results silently.
            panic!("releasing scratch buffer owned by '{tag}': {err}");
        }
        self.free.push(grid);
    }
}

/// Scratch checkout guard. Dereferences to the underlying [`Grid`] and
/// returns the buffer to its stack when dropped.
#[derive(Debug)]
pub struct ScratchGrid {
    grid: Option<Grid>,
    stack: Rc<RefCell<ScratchStack>>,
    tag: &'static str,
}

impl Deref for ScratchGrid {
    type Target = Grid;

    fn deref(&self) -> &Grid {
        self.grid.as_ref().expect("scratch grid present until drop")
    }
}

impl DerefMut for ScratchGrid {
    fn deref_mut(&mut self) -> &mut Grid {
        self.grid.as_mut().expect("scratch grid present until drop")
    }
}

impl Drop for ScratchGrid {
    fn drop(&mut self) {
        if let Some(grid) = self.grid.take() {
            self.stack.borrow_mut().push(grid, self.tag);
        }
    }
}

/// Per-worker persistent + scratch raster pools.
#[derive(Debug)]
pub struct WorkerPool {
    rows: usize,
    cols: usize,
    persistent: RefCell<Vec<Grid>>,
    persistent_capacity: usize,
    scratch: Rc<RefCell<ScratchStack>>,
}

impl WorkerPool {
    pub fn new(rows: usize, cols: usize, persistent: usize, scratch: usize) -> WorkerPool {
        let persistent_slots = (0..persistent).map(|_| Grid::new(rows, cols)).collect();
        let mut scratch_slots: Vec<Grid> = (0..scratch).map(|_| Grid::new(rows, cols)).collect();
        for grid in &mut scratch_slots {
            grid.poison();
        }
        WorkerPool {
            rows,
            cols,
            persistent: RefCell::new(persistent_slots),
            persistent_capacity: persistent,
            scratch: Rc::new(RefCell::new(ScratchStack {
                free: scratch_slots,
                capacity: scratch,
                min_free: scratch,
                last_owner: "",
                previous_owner: "",
            })),
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Take a persistent slot for the lifetime of the worker.
    pub fn acquire_persistent(&self, tag: &'static str) -> SprawlResult<Grid> {
        let mut grid = self.persistent.borrow_mut().pop().ok_or_else(|| {
            SprawlError::Pool(format!(
                "persistent stack underflow acquiring '{tag}' (capacity {})",
                self.persistent_capacity
            ))
        })?;
        grid.fill(0);
        Ok(grid)
    }

    /// Return a persistent slot (worker teardown).
    pub fn release_persistent(&self, grid: Grid) {
        self.persistent.borrow_mut().push(grid);
    }

    /// Check out a scratch buffer for the current phase.
    pub fn scratch(&self, tag: &'static str) -> SprawlResult<ScratchGrid> {
        let grid = self.scratch.borrow_mut().pop(tag)?;
        Ok(ScratchGrid {
            grid: Some(grid),
            stack: Rc::clone(&self.scratch),
            tag,
        })
    }

    /// Smallest free-stack depth observed since construction; capacity
    /// tuning input for `NUM_WORKING_GRIDS`.
    pub fn min_free_scratch(&self) -> usize {
        self.scratch.borrow().min_free
    }

    pub fn scratch_free(&self) -> usize {
        self.scratch.borrow().free.len()
    }

    pub fn scratch_capacity(&self) -> usize {
        self.scratch.borrow().capacity
    }

    /// Audit the pool: every free scratch buffer must still be fully
    /// poisoned with intact sentinels.
    pub fn check_memory(&self) -> SprawlResult<()> {
        let stack = self.scratch.borrow();
        for (i, grid) in stack.free.iter().enumerate() {
            grid.check_sentinels().map_err(|err| {
                SprawlError::Pool(format!(
                    "scratch slot {i} (last owner '{}'): {err}",
                    stack.last_owner
                ))
            })?;
            if !grid.is_poisoned() {
                return Err(SprawlError::Pool(format!(
                    "scratch slot {i} was written after release (last owner '{}', previous '{}')",
                    stack.last_owner, stack.previous_owner
                )));
            }
        }
        Ok(())
    }
}
