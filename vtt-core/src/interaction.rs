//! Pointer gestures to board commands.
//!
//! [`Interaction`] turns raw screen-space pointer events into [`Command`]s:
//! selecting tokens, moving them, or picking an attack target. It only reads
//! the board; the tabletop executes the commands it returns.
//!
//! Gestures:
//! - left-down on a token selects it and, if the user controls every selected
//!   token, starts a drag; releasing past the drag threshold moves the group
//! - left-down on an empty cell starts a marquee; releasing selects the tokens
//!   whose footprint intersects the rectangle (shift adds to the selection)
//! - while an attack is awaiting a target, a left click picks it
//! - right-drag pans the viewport independently of everything above
//! - the wheel zooms around the cursor

use crate::board::{can_control, Board};
use crate::entity::{EntityRef, Roster, User};
use crate::grid::{Cell, GridSystem, Point, Rect};
use serde::{Deserialize, Serialize};
use tracing::debug;

// ============================================================================
// Configuration
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionConfig {
    /// Screen pixels a pointer must travel before a press becomes a drag.
    pub drag_threshold: f64,
    pub min_zoom: f64,
    pub max_zoom: f64,
    /// Zoom factor applied per wheel notch.
    pub zoom_step: f64,
}

impl InteractionConfig {
    pub const DEFAULT_DRAG_THRESHOLD: f64 = 5.0;

    pub fn with_drag_threshold(mut self, pixels: f64) -> Self {
        self.drag_threshold = pixels;
        self
    }

    pub fn with_zoom_limits(mut self, min: f64, max: f64) -> Self {
        self.min_zoom = min;
        self.max_zoom = max;
        self
    }

    pub fn with_zoom_step(mut self, step: f64) -> Self {
        self.zoom_step = step;
        self
    }
}

impl Default for InteractionConfig {
    fn default() -> Self {
        Self {
            drag_threshold: Self::DEFAULT_DRAG_THRESHOLD,
            min_zoom: 0.25,
            max_zoom: 4.0,
            zoom_step: 1.1,
        }
    }
}

// ============================================================================
// Viewport
// ============================================================================

/// Pan and zoom between screen and world space: `screen = world * zoom + pan`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub pan: Point,
    pub zoom: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            pan: Point::default(),
            zoom: 1.0,
        }
    }
}

impl Viewport {
    pub fn screen_to_world(&self, p: Point) -> Point {
        Point::new((p.x - self.pan.x) / self.zoom, (p.y - self.pan.y) / self.zoom)
    }

    pub fn world_to_screen(&self, p: Point) -> Point {
        Point::new(p.x * self.zoom + self.pan.x, p.y * self.zoom + self.pan.y)
    }

    pub fn pan_by(&mut self, dx: f64, dy: f64) {
        self.pan.x += dx;
        self.pan.y += dy;
    }

    /// Scale by `factor`, clamped to `[min, max]`, keeping the world point
    /// under `screen` fixed.
    pub fn zoom_at(&mut self, screen: Point, factor: f64, min: f64, max: f64) {
        let anchor = self.screen_to_world(screen);
        self.zoom = (self.zoom * factor).clamp(min, max);
        self.pan = Point::new(
            screen.x - anchor.x * self.zoom,
            screen.y - anchor.y * self.zoom,
        );
    }
}

// ============================================================================
// Events and commands
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MouseButton {
    Left,
    Right,
}

/// Raw pointer input. Positions are in screen space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum PointerEvent {
    Down {
        pos: Point,
        button: MouseButton,
        shift: bool,
    },
    Move {
        pos: Point,
    },
    Up {
        pos: Point,
        button: MouseButton,
    },
    /// Negative delta zooms in.
    Wheel {
        pos: Point,
        delta: f64,
    },
}

/// What the tabletop should do in response to a gesture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    /// The selection is now exactly these entities.
    Select(Vec<EntityRef>),
    /// Move each entity to its cell, all or nothing.
    MoveTokens(Vec<(EntityRef, Cell)>),
    TargetEntity(EntityRef),
    TargetCell(Cell),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub enum InteractionState {
    #[default]
    Idle,
    DraggingTokens {
        /// Cell under the press; moves are offsets from it.
        anchor: Cell,
        /// Screen position of the press.
        start: Point,
        current: Point,
    },
    MarqueeSelecting {
        /// World-space corners.
        start: Point,
        current: Point,
        additive: bool,
    },
    AwaitingAttackTarget,
    AwaitingAoeTarget,
}

/// Read-only view of the table a gesture is evaluated against.
#[derive(Debug, Clone, Copy)]
pub struct Scene<'a> {
    pub grid: &'a GridSystem,
    pub board: &'a Board,
    pub roster: &'a Roster,
    pub user: &'a User,
}

// ============================================================================
// Interaction
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct Interaction {
    config: InteractionConfig,
    viewport: Viewport,
    state: InteractionState,
    selection: Vec<EntityRef>,
    /// Last screen position of an active right-button pan.
    pan_anchor: Option<Point>,
}

impl Interaction {
    pub fn new(config: InteractionConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn config(&self) -> &InteractionConfig {
        &self.config
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn viewport_mut(&mut self) -> &mut Viewport {
        &mut self.viewport
    }

    pub fn state(&self) -> InteractionState {
        self.state
    }

    pub fn is_panning(&self) -> bool {
        self.pan_anchor.is_some()
    }

    pub fn selection(&self) -> &[EntityRef] {
        &self.selection
    }

    pub fn set_selection(&mut self, mut entities: Vec<EntityRef>) {
        entities.sort();
        entities.dedup();
        self.selection = entities;
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    /// Wait for the next left click to pick a target cell (area) or entity.
    pub fn begin_targeting(&mut self, area: bool) {
        self.state = if area {
            InteractionState::AwaitingAoeTarget
        } else {
            InteractionState::AwaitingAttackTarget
        };
        debug!(area, "awaiting target");
    }

    /// Drop any gesture or pending target pick. Returns whether anything was active.
    pub fn cancel(&mut self) -> bool {
        let was_active = self.state != InteractionState::Idle;
        self.state = InteractionState::Idle;
        was_active
    }

    /// World-space marquee rectangle while one is being drawn.
    pub fn marquee_rect(&self) -> Option<Rect> {
        match self.state {
            InteractionState::MarqueeSelecting { start, current, .. } => {
                Some(Rect::from_corners(start, current))
            }
            _ => None,
        }
    }

    /// Feed one pointer event through the state machine.
    pub fn handle(&mut self, event: PointerEvent, scene: &Scene<'_>) -> Vec<Command> {
        match event {
            PointerEvent::Down {
                pos,
                button: MouseButton::Left,
                shift,
            } => self.left_down(pos, shift, scene),
            PointerEvent::Down {
                pos,
                button: MouseButton::Right,
                ..
            } => {
                self.pan_anchor = Some(pos);
                Vec::new()
            }
            PointerEvent::Move { pos } => {
                self.pointer_moved(pos);
                Vec::new()
            }
            PointerEvent::Up {
                pos,
                button: MouseButton::Left,
            } => self.left_up(pos, scene),
            PointerEvent::Up {
                button: MouseButton::Right,
                ..
            } => {
                self.pan_anchor = None;
                Vec::new()
            }
            PointerEvent::Wheel { pos, delta } => {
                if delta != 0.0 {
                    let factor = if delta < 0.0 {
                        self.config.zoom_step
                    } else {
                        1.0 / self.config.zoom_step
                    };
                    self.viewport
                        .zoom_at(pos, factor, self.config.min_zoom, self.config.max_zoom);
                }
                Vec::new()
            }
        }
    }

    fn left_down(&mut self, pos: Point, shift: bool, scene: &Scene<'_>) -> Vec<Command> {
        let world = self.viewport.screen_to_world(pos);
        let cell = scene.grid.cell_at(world);
        let occupant = cell.and_then(|c| scene.board.entity_at(c).map(|e| (c, e)));

        match self.state {
            InteractionState::AwaitingAttackTarget => {
                return match occupant {
                    Some((_, entity)) => {
                        self.state = InteractionState::Idle;
                        vec![Command::TargetEntity(entity)]
                    }
                    None => Vec::new(),
                };
            }
            InteractionState::AwaitingAoeTarget => {
                return match cell {
                    Some(cell) => {
                        self.state = InteractionState::Idle;
                        vec![Command::TargetCell(cell)]
                    }
                    None => Vec::new(),
                };
            }
            _ => {}
        }

        let Some((cell, entity)) = occupant else {
            self.state = InteractionState::MarqueeSelecting {
                start: world,
                current: world,
                additive: shift,
            };
            return Vec::new();
        };

        if shift {
            if let Some(i) = self.selection.iter().position(|&e| e == entity) {
                self.selection.remove(i);
            } else {
                self.selection.push(entity);
                self.selection.sort();
            }
            self.state = InteractionState::Idle;
            return vec![Command::Select(self.selection.clone())];
        }

        let mut commands = Vec::new();
        if !self.selection.contains(&entity) {
            self.selection = vec![entity];
            commands.push(Command::Select(self.selection.clone()));
        }

        let controllable = self
            .selection
            .iter()
            .all(|&e| can_control(e, scene.user, scene.roster));
        self.state = if controllable {
            InteractionState::DraggingTokens {
                anchor: cell,
                start: pos,
                current: pos,
            }
        } else {
            debug!(user = %scene.user.name, "drag refused; selection only");
            InteractionState::Idle
        };
        commands
    }

    fn pointer_moved(&mut self, pos: Point) {
        if let Some(last) = self.pan_anchor {
            self.viewport.pan_by(pos.x - last.x, pos.y - last.y);
            self.pan_anchor = Some(pos);
        }
        let world = self.viewport.screen_to_world(pos);
        match &mut self.state {
            InteractionState::DraggingTokens { current, .. } => *current = pos,
            InteractionState::MarqueeSelecting { current, .. } => *current = world,
            _ => {}
        }
    }

    fn left_up(&mut self, pos: Point, scene: &Scene<'_>) -> Vec<Command> {
        let world = self.viewport.screen_to_world(pos);
        match self.state {
            InteractionState::DraggingTokens { anchor, start, .. } => {
                self.state = InteractionState::Idle;
                if start.distance(pos) < self.config.drag_threshold {
                    return Vec::new();
                }
                let Some(drop) = scene.grid.cell_at(world) else {
                    return Vec::new();
                };
                if drop == anchor {
                    return Vec::new();
                }
                self.group_moves(anchor, drop, scene.board)
                    .map(|moves| vec![Command::MoveTokens(moves)])
                    .unwrap_or_default()
            }
            InteractionState::MarqueeSelecting {
                start, additive, ..
            } => {
                self.state = InteractionState::Idle;
                let rect = Rect::from_corners(start, world);
                let mut hits: Vec<EntityRef> = scene
                    .board
                    .occupants_in_rect(&rect, scene.grid)
                    .into_iter()
                    .map(|(_, e)| e)
                    .collect();
                if additive {
                    hits.extend(self.selection.iter().copied());
                }
                self.set_selection(hits);
                vec![Command::Select(self.selection.clone())]
            }
            _ => Vec::new(),
        }
    }

    /// Offset every selected token by `to - from`. `None` if any would leave the grid.
    fn group_moves(&self, from: Cell, to: Cell, board: &Board) -> Option<Vec<(EntityRef, Cell)>> {
        let dr = i64::from(to.row) - i64::from(from.row);
        let dc = i64::from(to.col) - i64::from(from.col);
        self.selection
            .iter()
            .map(|&entity| {
                let cell = board.position_of(entity.kind, entity.id)?;
                let dest = Cell::from_signed(i64::from(cell.row) + dr, i64::from(cell.col) + dc)?;
                Some((entity, dest))
            })
            .collect()
    }
}
