//! Scatter geometry for depositing a group's tokens around a container token.

use std::cmp::Ordering;

use crate::types::{PieceId, Point, Rect, Size};

/// A grid cell a deposited token may be moved to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlacementCandidate {
    /// Top-left corner of the cell.
    pub position: Point,
    pub center: Point,
    pub width: f32,
    /// Movement from the container's center to this cell crosses a wall.
    pub blocked: bool,
}

/// Grid cells whose centers lie within `radius_factor * container.width` of
/// the container's center, nearest first (ties by `y`, then `x`).
///
/// # Arguments
/// * `container` - Bounds of the container token in world pixels.
/// * `grid_size` - Side of one grid cell.
/// * `blocks` - Movement collision test, called with `(container center, cell center)`.
///
/// # Returns
/// * Every cell in range, including blocked ones, excluding the cell at the
///   container's own position or center.
pub fn candidate_cells(
    container: Rect,
    grid_size: f32,
    radius_factor: f32,
    blocks: impl Fn(Point, Point) -> bool,
) -> Vec<PlacementCandidate> {
    if grid_size <= 0.0 {
        log::warn!("grid size {grid_size} is not positive, no placement candidates");
        return Vec::new();
    }

    let origin = container.center();
    let radius = radius_factor * container.width;
    let half = grid_size / 2.0;

    let first_col = ((origin.x - radius) / grid_size).floor() as i64;
    let last_col = ((origin.x + radius) / grid_size).ceil() as i64;
    let first_row = ((origin.y - radius) / grid_size).floor() as i64;
    let last_row = ((origin.y + radius) / grid_size).ceil() as i64;

    let mut candidates = Vec::new();
    for row in first_row..=last_row {
        for col in first_col..=last_col {
            let position = Point::new(col as f32 * grid_size, row as f32 * grid_size);
            let center = Point::new(position.x + half, position.y + half);
            if center.distance_to(origin) > radius {
                continue;
            }
            if position == Point::new(container.x, container.y) || center == origin {
                continue;
            }
            candidates.push(PlacementCandidate {
                position,
                center,
                width: grid_size,
                blocked: blocks(origin, center),
            });
        }
    }

    candidates.sort_by(|a, b| by_distance(origin, a, b));
    candidates
}

fn squared_distance(a: Point, b: Point) -> f32 {
    let dx = a.x - b.x;
    let dy = a.y - b.y;
    dx * dx + dy * dy
}

fn by_distance(origin: Point, a: &PlacementCandidate, b: &PlacementCandidate) -> Ordering {
    squared_distance(origin, a.center)
        .total_cmp(&squared_distance(origin, b.center))
        .then(a.position.y.total_cmp(&b.position.y))
        .then(a.position.x.total_cmp(&b.position.x))
}

/// Computes final positions for freshly created tokens stacked on the container.
///
/// Tokens are placed widest first (stable, so ties keep creation order). A
/// candidate qualifies when it is at least the token's width away from the
/// container's position on both axes and the token's footprint there does not
/// overlap the container or any token already placed. Without a qualifying
/// cell the nearest remaining one is used; with none left the token stays on
/// the container. Each chosen cell is consumed.
pub fn solve_deposit(
    container: Rect,
    pieces: &[(PieceId, Size)],
    candidates: &[PlacementCandidate],
) -> Vec<(PieceId, Point)> {
    let start = Point::new(container.x, container.y);

    let mut order: Vec<&(PieceId, Size)> = pieces.iter().collect();
    order.sort_by(|a, b| b.1.width.total_cmp(&a.1.width));

    let mut remaining: Vec<&PlacementCandidate> =
        candidates.iter().filter(|candidate| !candidate.blocked).collect();
    let mut occupied = vec![container];
    let mut placements = Vec::with_capacity(order.len());

    for (id, size) in order {
        let footprint_at =
            |at: Point| Rect::new(at.x, at.y, size.width, size.height);

        let spaced = remaining.iter().position(|candidate| {
            start.min_axis_offset_to(candidate.position) >= size.width
                && !occupied
                    .iter()
                    .any(|placed| placed.overlaps(&footprint_at(candidate.position)))
        });

        let chosen = match spaced {
            Some(index) => Some(remaining.remove(index)),
            None if !remaining.is_empty() => {
                log::debug!("no spaced cell for {id}, using nearest free cell");
                Some(remaining.remove(0))
            }
            None => None,
        };

        let position = match chosen {
            Some(candidate) => candidate.position,
            None => {
                log::debug!("no cell left for {id}, leaving it on the container");
                start
            }
        };
        occupied.push(footprint_at(position));
        placements.push((id.clone(), position));
    }

    placements
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Segment;

    const GRID: f32 = 50.0;

    fn container() -> Rect {
        Rect::new(500.0, 500.0, 100.0, 100.0)
    }

    fn square(id: &str, side: f32) -> (PieceId, Size) {
        (PieceId::new(id), Size::new(side, side))
    }

    fn position_of(placements: &[(PieceId, Point)], id: &str) -> Point {
        placements
            .iter()
            .find(|(piece, _)| piece.as_str() == id)
            .map(|(_, point)| *point)
            .unwrap()
    }

    #[test]
    fn candidates_are_within_radius_and_sorted() {
        let cells = candidate_cells(container(), GRID, 3.5, |_, _| false);
        let origin = container().center();

        assert!(!cells.is_empty());
        assert!(cells.iter().all(|cell| cell.center.distance_to(origin) <= 350.0));
        assert!(!cells.iter().any(|cell| cell.position == Point::new(500.0, 500.0)));
        assert_eq!(cells[0].position, Point::new(550.0, 500.0));
        for pair in cells.windows(2) {
            assert_ne!(by_distance(origin, &pair[0], &pair[1]), Ordering::Greater);
        }
    }

    #[test]
    fn blocked_cells_are_marked() {
        let wall = Segment::new(Point::new(620.0, 0.0), Point::new(620.0, 1200.0));
        let cells = candidate_cells(container(), GRID, 3.5, |from, to| {
            wall.intersects(&Segment::new(from, to))
        });

        assert!(cells.iter().filter(|cell| cell.center.x > 620.0).all(|cell| cell.blocked));
        assert!(cells.iter().filter(|cell| cell.center.x < 620.0).all(|cell| !cell.blocked));
    }

    #[test]
    fn three_pieces_scatter_largest_first() {
        let cells = candidate_cells(container(), GRID, 3.5, |_, _| false);
        let pieces = [square("small-a", 50.0), square("large", 100.0), square("small-b", 50.0)];
        let placements = solve_deposit(container(), &pieces, &cells);

        assert_eq!(placements[0].0.as_str(), "large");
        assert_eq!(placements[1].0.as_str(), "small-a");
        assert_eq!(placements[2].0.as_str(), "small-b");

        assert_eq!(position_of(&placements, "large"), Point::new(600.0, 600.0));
        assert_eq!(position_of(&placements, "small-a"), Point::new(550.0, 450.0));
        assert_eq!(position_of(&placements, "small-b"), Point::new(450.0, 550.0));
    }

    #[test]
    fn spaced_cells_clear_the_width_on_both_axes() {
        let cells = candidate_cells(container(), GRID, 3.5, |_, _| false);
        let pieces = [square("large", 100.0), square("small-a", 50.0), square("small-b", 50.0)];
        let placements = solve_deposit(container(), &pieces, &cells);

        for (id, at) in &placements {
            let width = pieces.iter().find(|(piece, _)| piece == id).unwrap().1.width;
            assert!((at.x - 500.0).abs() >= width, "{id} too close on x at {at:?}");
            assert!((at.y - 500.0).abs() >= width, "{id} too close on y at {at:?}");
        }
    }

    #[test]
    fn placed_footprints_never_overlap() {
        let cells = candidate_cells(container(), GRID, 3.5, |_, _| false);
        let pieces: Vec<(PieceId, Size)> = (0..6)
            .map(|i| square(&format!("p{i}"), if i % 2 == 0 { 100.0 } else { 50.0 }))
            .collect();
        let placements = solve_deposit(container(), &pieces, &cells);

        let footprints: Vec<Rect> = placements
            .iter()
            .map(|(id, at)| {
                let size = pieces.iter().find(|(p, _)| p == id).unwrap().1;
                Rect::new(at.x, at.y, size.width, size.height)
            })
            .collect();
        for (i, a) in footprints.iter().enumerate() {
            assert!(!a.overlaps(&container()));
            for b in &footprints[i + 1..] {
                assert!(!a.overlaps(b), "{a:?} overlaps {b:?}");
            }
        }
    }

    #[test]
    fn falls_back_then_stays_on_container() {
        let cells = vec![PlacementCandidate {
            position: Point::new(550.0, 500.0),
            center: Point::new(575.0, 525.0),
            width: GRID,
            blocked: false,
        }];
        let pieces = [square("first", 100.0), square("second", 100.0)];
        let placements = solve_deposit(container(), &pieces, &cells);

        assert_eq!(position_of(&placements, "first"), Point::new(550.0, 500.0));
        assert_eq!(position_of(&placements, "second"), Point::new(500.0, 500.0));
    }

    #[test]
    fn blocked_candidates_are_skipped() {
        let cells = candidate_cells(container(), GRID, 3.5, |_, to| to.x > 600.0);
        let placements = solve_deposit(container(), &[square("large", 100.0)], &cells);

        let at = position_of(&placements, "large");
        assert!(at.x + 25.0 <= 600.0);
        assert_eq!(at, Point::new(400.0, 600.0));
    }

    #[test]
    fn zero_grid_yields_no_candidates() {
        assert!(candidate_cells(container(), 0.0, 3.5, |_, _| false).is_empty());
    }
}
