//! Composition around an externally owned token drag controller.
//!
//! The overlay never patches the controller. It wraps it in [`ObservedDrag`],
//! which forwards every lifecycle event first and notifies observers after.

use std::rc::Rc;

use crate::types::{PieceId, Point};

/// The three lifecycle events of a token drag. Return values mean "handled".
pub trait DragHandler {
    fn drag_start(&mut self, piece: &PieceId, at: Point) -> bool;
    fn drag_move(&mut self, piece: &PieceId, at: Point) -> bool;
    /// Called for both a drop and a cancelled drag.
    fn drag_end(&mut self, piece: &PieceId, at: Point, cancelled: bool) -> bool;
}

pub trait DragObserver {
    fn drag_started(&self, _piece: &PieceId) {}
    fn drag_moved(&self, _piece: &PieceId, _at: Point) {}
    fn drag_ended(&self, _piece: &PieceId, _cancelled: bool) {}
}

impl<T: DragObserver + ?Sized> DragObserver for Rc<T> {
    fn drag_started(&self, piece: &PieceId) {
        (**self).drag_started(piece)
    }

    fn drag_moved(&self, piece: &PieceId, at: Point) {
        (**self).drag_moved(piece, at)
    }

    fn drag_ended(&self, piece: &PieceId, cancelled: bool) {
        (**self).drag_ended(piece, cancelled)
    }
}

/// Decorates `handler`, preserving its results unchanged.
#[derive(Debug)]
pub struct ObservedDrag<D, O> {
    handler: D,
    observer: O,
}

impl<D: DragHandler, O: DragObserver> ObservedDrag<D, O> {
    pub fn new(handler: D, observer: O) -> Self {
        ObservedDrag { handler, observer }
    }

    pub fn into_inner(self) -> D {
        self.handler
    }
}

impl<D: DragHandler, O: DragObserver> DragHandler for ObservedDrag<D, O> {
    fn drag_start(&mut self, piece: &PieceId, at: Point) -> bool {
        let handled = self.handler.drag_start(piece, at);
        self.observer.drag_started(piece);
        handled
    }

    fn drag_move(&mut self, piece: &PieceId, at: Point) -> bool {
        let handled = self.handler.drag_move(piece, at);
        self.observer.drag_moved(piece, at);
        handled
    }

    fn drag_end(&mut self, piece: &PieceId, at: Point, cancelled: bool) -> bool {
        let handled = self.handler.drag_end(piece, at, cancelled);
        self.observer.drag_ended(piece, cancelled);
        handled
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;

    #[derive(Default)]
    struct Journal(RefCell<Vec<String>>);

    impl Journal {
        fn push(&self, entry: impl Into<String>) {
            self.0.borrow_mut().push(entry.into());
        }
    }

    struct Controller {
        journal: Rc<Journal>,
    }

    impl DragHandler for Controller {
        fn drag_start(&mut self, _piece: &PieceId, _at: Point) -> bool {
            self.journal.push("handler start");
            true
        }

        fn drag_move(&mut self, _piece: &PieceId, _at: Point) -> bool {
            self.journal.push("handler move");
            false
        }

        fn drag_end(&mut self, _piece: &PieceId, _at: Point, cancelled: bool) -> bool {
            self.journal.push(format!("handler end {cancelled}"));
            !cancelled
        }
    }

    impl DragObserver for Journal {
        fn drag_started(&self, _piece: &PieceId) {
            self.push("observer start");
        }

        fn drag_ended(&self, _piece: &PieceId, cancelled: bool) {
            self.push(format!("observer end {cancelled}"));
        }
    }

    #[test]
    fn delegates_first_and_preserves_results() {
        let journal = Rc::new(Journal::default());
        let mut drag = ObservedDrag::new(
            Controller {
                journal: journal.clone(),
            },
            journal.clone(),
        );
        let piece = PieceId::new("token");
        let at = Point::new(1.0, 2.0);

        assert!(drag.drag_start(&piece, at));
        assert!(!drag.drag_move(&piece, at));
        assert!(!drag.drag_end(&piece, at, true));

        assert_eq!(
            *journal.0.borrow(),
            vec![
                "handler start",
                "observer start",
                "handler move",
                "handler end true",
                "observer end true",
            ]
        );
    }
}
