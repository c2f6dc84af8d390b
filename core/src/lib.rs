#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the merge grid engine.
//!
//! This crate defines the message surface that connects adapters, the
//! authoritative world, and pure systems. Adapters and systems submit
//! [`Command`] values describing desired mutations, the world executes those
//! commands via its `apply` entry point, and then broadcasts [`Event`] values
//! describing what actually happened. Nothing in here owns state; the
//! identifiers are opaque handles minted by the pool registry and the world.

pub mod config;

use std::{fmt, num::NonZeroU32, time::Duration};

use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Stable key identifying an entity blueprint, for example `"knife/2"`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TemplateId(String);

impl TemplateId {
    /// Creates a template identifier from the provided key.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Borrows the textual key of the template.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Reports whether the key is empty or whitespace, which never names a template.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for TemplateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Unique handle assigned to a pooled instance when it is first created.
///
/// Identifiers are never reused, so a handle to a destroyed instance stays
/// dangling forever instead of aliasing a newer one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InstanceId(u64);

impl InstanceId {
    /// Creates a new instance identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u64 {
        self.0
    }
}

/// Scene node that spawned instances are attached to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ParentId(u32);

impl ParentId {
    /// Creates a new parent identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// One of the two spatial surfaces units are placed on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Board {
    /// Board laid out behind the anchor when the boards are not swapped.
    A,
    /// Board laid out at the anchor when the boards are not swapped.
    B,
}

impl Board {
    /// Both boards in index order.
    pub const ALL: [Board; 2] = [Board::A, Board::B];

    /// Dense index of the board, suitable for addressing per-board arrays.
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Board::A => 0,
            Board::B => 1,
        }
    }

    /// Returns the opposite board.
    #[must_use]
    pub const fn other(self) -> Board {
        match self {
            Board::A => Board::B,
            Board::B => Board::A,
        }
    }
}

/// Location of a single grid cell expressed as row and column coordinates.
///
/// Coordinates are signed so that positions derived from world space can fall
/// outside the board and be rejected instead of wrapping around.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellCoord {
    row: i32,
    column: i32,
}

impl CellCoord {
    /// Creates a new grid cell coordinate.
    #[must_use]
    pub const fn new(row: i32, column: i32) -> Self {
        Self { row, column }
    }

    /// Zero-based row index of the cell.
    #[must_use]
    pub const fn row(&self) -> i32 {
        self.row
    }

    /// Zero-based column index of the cell.
    #[must_use]
    pub const fn column(&self) -> i32 {
        self.column
    }

    /// Returns the cell displaced by the provided row and column deltas.
    #[must_use]
    pub const fn offset(self, rows: i32, columns: i32) -> Self {
        Self {
            row: self.row.saturating_add(rows),
            column: self.column.saturating_add(columns),
        }
    }
}

impl fmt::Display for CellCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}c{}", self.row, self.column)
    }
}

/// Family a unit belongs to, such as `"Knife"` or `"Gun"`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnitType(String);

impl UnitType {
    /// Creates a unit type from the provided name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Borrows the name of the unit type.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UnitType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Positive upgrade level of a unit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Level(NonZeroU32);

impl Level {
    /// Entry level every freshly placed unit starts at.
    pub const FIRST: Level = Level(NonZeroU32::MIN);

    /// Creates a level, returning `None` for zero.
    #[must_use]
    pub const fn new(value: u32) -> Option<Self> {
        match NonZeroU32::new(value) {
            Some(value) => Some(Self(value)),
            None => None,
        }
    }

    /// Retrieves the numeric level.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0.get()
    }

    /// Level reached by merging two units of this level.
    #[must_use]
    pub const fn next(self) -> Option<Self> {
        match self.0.checked_add(1) {
            Some(value) => Some(Self(value)),
            None => None,
        }
    }

    /// Zero-based index used to address per-level tables.
    #[must_use]
    pub const fn index(self) -> usize {
        (self.0.get() - 1) as usize
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.0)
    }
}

/// Upper bound on the number of instances a pool may hold.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Capacity {
    /// The pool may grow without bound.
    #[default]
    Unlimited,
    /// The pool never holds more than the given number of instances.
    Bounded(usize),
}

impl Capacity {
    /// Interprets a signed size where any negative value means unlimited.
    #[must_use]
    pub fn from_signed(value: i64) -> Self {
        match usize::try_from(value) {
            Ok(bound) => Capacity::Bounded(bound),
            Err(_) => Capacity::Unlimited,
        }
    }

    /// Reports whether a pool holding `total` instances may create another one.
    #[must_use]
    pub const fn has_room(&self, total: usize) -> bool {
        match self {
            Capacity::Unlimited => true,
            Capacity::Bounded(bound) => total < *bound,
        }
    }
}

impl fmt::Display for Capacity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capacity::Unlimited => f.write_str("unlimited"),
            Capacity::Bounded(bound) => write!(f, "{bound}"),
        }
    }
}

/// Commands that express all permissible world mutations.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// Advances the simulation clock by the provided delta time.
    Tick {
        /// Duration of simulated time that elapsed since the previous tick.
        dt: Duration,
    },
    /// Requests that a new unit be spawned into an empty cell.
    SpawnUnit {
        /// Blueprint the unit's visual instance is drawn from.
        template: TemplateId,
        /// Family the unit belongs to.
        unit_type: UnitType,
        /// Level assigned to the unit.
        level: Level,
        /// Board receiving the unit.
        board: Board,
        /// Cell receiving the unit.
        cell: CellCoord,
    },
    /// Lifts a unit off its cell at the start of a drag.
    PickUpUnit {
        /// Unit being lifted.
        instance: InstanceId,
    },
    /// Resolves the drop of a dragged unit at a world-space position.
    DropUnit {
        /// Unit being dropped.
        instance: InstanceId,
        /// Board the position is interpreted against.
        board: Board,
        /// World-space position the unit was released at.
        position: Vec3,
    },
    /// Attempts to merge a source unit into the occupant of a target cell.
    TryMerge {
        /// Board containing the target cell.
        board: Board,
        /// Cell occupied by the merge target.
        cell: CellCoord,
        /// Unit merged into the target.
        source: InstanceId,
    },
    /// Releases every occupant of a board back to its pool.
    ClearBoard {
        /// Board to clear.
        board: Board,
    },
    /// Releases every occupant of both boards back to their pools.
    ClearAll,
    /// Swaps the boards end-to-end, repositioning tiles and occupants.
    SwapBoards,
    /// Returns the tile visuals of a board to the tile pool.
    ReleaseTiles {
        /// Board whose tiles are released.
        board: Board,
    },
}

/// Events broadcast by the world after processing commands.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    /// Indicates that the simulation clock advanced.
    TimeAdvanced {
        /// Duration of simulated time that elapsed in the tick.
        dt: Duration,
    },
    /// Confirms that a unit was spawned into a cell.
    UnitSpawned {
        /// Instance backing the unit.
        instance: InstanceId,
        /// Family of the unit.
        unit_type: UnitType,
        /// Level of the unit.
        level: Level,
        /// Board holding the unit.
        board: Board,
        /// Cell holding the unit.
        cell: CellCoord,
    },
    /// Reports that a unit spawn request was rejected.
    SpawnRejected {
        /// Template requested for the unit.
        template: TemplateId,
        /// Board targeted by the request.
        board: Board,
        /// Cell targeted by the request.
        cell: CellCoord,
        /// Specific reason the spawn failed.
        reason: SpawnError,
    },
    /// Confirms that a unit was lifted off its cell.
    UnitPickedUp {
        /// Unit that was lifted.
        instance: InstanceId,
        /// Board the unit was lifted from.
        board: Board,
        /// Cell the unit was lifted from.
        cell: CellCoord,
    },
    /// Confirms that a dropped unit now occupies a cell.
    UnitMoved {
        /// Unit that moved.
        instance: InstanceId,
        /// Board now holding the unit.
        board: Board,
        /// Cell now holding the unit.
        cell: CellCoord,
    },
    /// Reports that a dropped unit returned to its home cell.
    UnitDropReverted {
        /// Unit that was reverted.
        instance: InstanceId,
    },
    /// Reports that a dropped unit found its home cell taken and went back to its pool.
    UnitReleased {
        /// Unit that was released.
        instance: InstanceId,
    },
    /// Confirms that two units merged into a higher level unit.
    UnitMerged {
        /// Instance backing the upgraded unit.
        instance: InstanceId,
        /// Family of the upgraded unit.
        unit_type: UnitType,
        /// Level of the upgraded unit.
        level: Level,
        /// Board holding the upgraded unit.
        board: Board,
        /// Cell holding the upgraded unit.
        cell: CellCoord,
        /// Source and target instances consumed by the merge.
        consumed: [InstanceId; 2],
    },
    /// Reports that a merge attempt left the world untouched.
    MergeRejected {
        /// Board containing the target cell.
        board: Board,
        /// Target cell of the attempt.
        cell: CellCoord,
        /// Unit that attempted the merge.
        source: InstanceId,
        /// Specific reason the merge failed.
        reason: MergeRejection,
    },
    /// Announces that a merge lock lapsed.
    MergeLockReleased {
        /// Unit whose lock lapsed.
        instance: InstanceId,
    },
    /// Confirms that a board's occupants were released.
    BoardCleared {
        /// Board that was cleared.
        board: Board,
        /// Number of occupants returned to their pools.
        released: usize,
    },
    /// Confirms that a board's tiles were released.
    TilesReleased {
        /// Board whose tiles were released.
        board: Board,
        /// Number of tiles returned to the tile pool.
        released: usize,
    },
    /// Announces that the board layout was toggled.
    BoardsSwapped {
        /// Whether the boards are now in swapped order.
        swapped: bool,
    },
}

/// Failures reported by pool operations.
#[derive(Clone, Debug, PartialEq, Eq, Hash, thiserror::Error)]
pub enum PoolError {
    /// The pool is at capacity and may not expand.
    #[error("pool for `{template}` is exhausted at capacity {capacity}")]
    Exhausted {
        /// Template whose pool is exhausted.
        template: TemplateId,
        /// Capacity of the exhausted pool.
        capacity: Capacity,
    },
    /// The template is blank or unknown to the instance factory.
    #[error("template `{template}` is not a known blueprint")]
    InvalidTemplate {
        /// Template that failed to resolve.
        template: TemplateId,
    },
}

/// Reasons a unit spawn request may be rejected by the world.
#[derive(Clone, Debug, PartialEq, Eq, Hash, thiserror::Error)]
pub enum SpawnError {
    /// The requested cell lies outside the board.
    #[error("cell lies outside the board")]
    OutOfBounds,
    /// The requested cell already holds a unit.
    #[error("cell is already occupied")]
    CellOccupied,
    /// The pool could not produce an instance.
    #[error(transparent)]
    Pool(#[from] PoolError),
}

/// Reasons a merge attempt may be rejected; the world is unchanged in every case.
#[derive(Clone, Debug, PartialEq, Eq, Hash, thiserror::Error)]
pub enum MergeRejection {
    /// The target cell holds no occupant.
    #[error("target cell is empty")]
    EmptyTarget,
    /// The source already is the occupant of the target cell.
    #[error("a unit cannot merge with itself")]
    SameInstance,
    /// An instance taking part in the merge carries no unit record.
    #[error("instance {instance:?} has no unit record")]
    MissingUnit {
        /// Instance lacking unit metadata.
        instance: InstanceId,
    },
    /// The source and target belong to different families.
    #[error("unit types differ")]
    TypeMismatch,
    /// The source and target have different levels.
    #[error("unit levels differ")]
    LevelMismatch,
    /// No upgrade exists beyond the current level.
    #[error("{unit_type} is already at its maximum level {level}")]
    MaxLevel {
        /// Family of the units.
        unit_type: UnitType,
        /// Shared level of the units.
        level: Level,
    },
    /// The upgraded instance could not be spawned, so nothing was committed.
    #[error("upgraded unit could not be spawned: {0}")]
    SpawnFailed(PoolError),
}

/// Failure reported by an external merge listener.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("merge listener failed: {0}")]
pub struct ListenerError(pub String);
