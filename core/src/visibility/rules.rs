use crate::errors::HudError;
use crate::host::{Store, Surface};
use crate::types::{ActorId, Piece, PieceId, PieceUpdate, Point, User};

use super::flags::{FlagWrite, VisibilityFlagSet};
use super::roster::{resolve_roster, RosterEntry};
use crate::constants::HIDDEN_FROM_FLAG;

/// Arguments of one visibility evaluation, as handed to the detection pipeline.
#[derive(Debug, Clone, Copy)]
pub struct VisibilityQuery<'a> {
    /// The object being looked at; `None` for non-token objects.
    pub target: Option<&'a Piece>,
    /// Sample points the pipeline tests line of sight against.
    pub tests: &'a [Point],
}

/// A line-of-sight/detection test: `(observer token, mode, query) -> visible?`.
pub trait DetectionTest {
    fn test_visibility(&self, observer: &Piece, mode: &str, query: &VisibilityQuery<'_>) -> bool;
}

/// Adapts a closure into a [`DetectionTest`].
pub struct FnDetection<F>(F);

impl<F> FnDetection<F>
where
    F: Fn(&Piece, &str, &VisibilityQuery<'_>) -> bool,
{
    pub fn new(f: F) -> Self {
        FnDetection(f)
    }
}

impl<F> DetectionTest for FnDetection<F>
where
    F: Fn(&Piece, &str, &VisibilityQuery<'_>) -> bool,
{
    fn test_visibility(&self, observer: &Piece, mode: &str, query: &VisibilityQuery<'_>) -> bool {
        (self.0)(observer, mode, query)
    }
}

impl DetectionTest for Box<dyn DetectionTest> {
    fn test_visibility(&self, observer: &Piece, mode: &str, query: &VisibilityQuery<'_>) -> bool {
        self.as_ref().test_visibility(observer, mode, query)
    }
}

/// Core predicate: an observer in `flags` never sees the target; anyone else
/// gets whatever the default test says.
pub fn is_visible_to(
    observer: &ActorId,
    flags: &VisibilityFlagSet,
    default_test: impl FnOnce() -> bool,
) -> bool {
    if flags.contains(observer) {
        return false;
    }
    default_test()
}

/// Evaluates the flag gate for one pipeline call, delegating to `next` when
/// the gate does not apply.
fn gate(
    namespace: &str,
    observer: &Piece,
    query: &VisibilityQuery<'_>,
    next: impl FnOnce() -> bool,
) -> bool {
    let (Some(target), Some(observer_actor)) = (query.target, observer.actor_id.as_ref()) else {
        return next();
    };
    let flags = VisibilityFlagSet::read(target, namespace);
    is_visible_to(observer_actor, &flags, next)
}

/// Detection test that owns the test it replaces (override installation).
pub struct VisibilityGate<D> {
    inner: D,
    namespace: String,
}

impl<D: DetectionTest> VisibilityGate<D> {
    pub fn new(inner: D, namespace: impl Into<String>) -> Self {
        VisibilityGate {
            inner,
            namespace: namespace.into(),
        }
    }
}

impl<D: DetectionTest> DetectionTest for VisibilityGate<D> {
    fn test_visibility(&self, observer: &Piece, mode: &str, query: &VisibilityQuery<'_>) -> bool {
        gate(&self.namespace, observer, query, || {
            self.inner.test_visibility(observer, mode, query)
        })
    }
}

type Wrapper = Box<dyn Fn(&Piece, &str, &VisibilityQuery<'_>, &dyn DetectionTest) -> bool>;

/// The external perception pipeline's single interception point.
///
/// Pipelines that offer a wrapping API accept wrappers which receive the next
/// layer and may call through; otherwise the base test can only be replaced.
pub struct DetectionPipeline {
    base: Box<dyn DetectionTest>,
    wrappers: Vec<Wrapper>,
    supports_wrapping: bool,
}

struct Layer<'p> {
    pipeline: &'p DetectionPipeline,
    depth: usize,
}

impl DetectionTest for Layer<'_> {
    fn test_visibility(&self, observer: &Piece, mode: &str, query: &VisibilityQuery<'_>) -> bool {
        self.pipeline.call_layer(self.depth, observer, mode, query)
    }
}

impl DetectionPipeline {
    pub fn new(base: Box<dyn DetectionTest>, supports_wrapping: bool) -> Self {
        DetectionPipeline {
            base,
            wrappers: Vec::new(),
            supports_wrapping,
        }
    }

    pub fn supports_wrapping(&self) -> bool {
        self.supports_wrapping
    }

    /// Runs one evaluation through every installed layer.
    pub fn evaluate(&self, observer: &Piece, mode: &str, query: &VisibilityQuery<'_>) -> bool {
        self.call_layer(self.wrappers.len(), observer, mode, query)
    }

    fn call_layer(
        &self,
        depth: usize,
        observer: &Piece,
        mode: &str,
        query: &VisibilityQuery<'_>,
    ) -> bool {
        if depth == 0 {
            return self.base.test_visibility(observer, mode, query);
        }
        let next = Layer {
            pipeline: self,
            depth: depth - 1,
        };
        (self.wrappers[depth - 1])(observer, mode, query, &next)
    }

    /// Registers a wrapper; the last registered wrapper runs first.
    ///
    /// # Returns
    /// * `false` (and drops the wrapper) if the pipeline has no wrapping API.
    pub fn register_wrapper(&mut self, wrapper: Wrapper) -> bool {
        if !self.supports_wrapping {
            return false;
        }
        self.wrappers.push(wrapper);
        true
    }

    /// Replaces the base test with `f(old base)`.
    pub fn override_base<F>(&mut self, f: F)
    where
        F: FnOnce(Box<dyn DetectionTest>) -> Box<dyn DetectionTest>,
    {
        let placeholder: Box<dyn DetectionTest> =
            Box::new(FnDetection::new(|_: &Piece, _: &str, _: &VisibilityQuery<'_>| true));
        let old = std::mem::replace(&mut self.base, placeholder);
        self.base = f(old);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterceptionStrategy {
    Wrap,
    Override,
}

/// Installs the visibility gate at the pipeline's interception point,
/// preferring the wrapping API and falling back to replacing the base test.
pub fn install_visibility_gate(
    pipeline: &mut DetectionPipeline,
    namespace: &str,
) -> InterceptionStrategy {
    let wrap_namespace = namespace.to_string();
    let wrapped = pipeline.register_wrapper(Box::new(
        move |observer: &Piece,
              mode: &str,
              query: &VisibilityQuery<'_>,
              next: &dyn DetectionTest| {
            gate(&wrap_namespace, observer, query, || {
                next.test_visibility(observer, mode, query)
            })
        },
    ));

    if wrapped {
        log::info!("Visibility gate installed through the pipeline wrapping API");
        return InterceptionStrategy::Wrap;
    }

    let override_namespace = namespace.to_string();
    pipeline.override_base(move |old| Box::new(VisibilityGate::new(old, override_namespace)));
    log::info!("Visibility gate installed by overriding the base detection test");
    InterceptionStrategy::Override
}

/// Alpha to draw `piece` with for `viewer`.
///
/// GMs see tokens hidden from some observers (but not from everyone) dimmed;
/// everyone else always gets full opacity.
pub fn redraw_alpha(viewer: &User, piece: &Piece, namespace: &str, dim_alpha: f32) -> f32 {
    if viewer.is_gm && !piece.hidden && !VisibilityFlagSet::read(piece, namespace).is_empty() {
        dim_alpha
    } else {
        1.0
    }
}

/// Redraw hook: applies or removes the dim marker. Never touches persisted state.
pub fn on_piece_redraw<S: Surface>(
    surface: &S,
    viewer: &User,
    piece: &Piece,
    namespace: &str,
    dim_alpha: f32,
) {
    surface.set_piece_alpha(&piece.id, redraw_alpha(viewer, piece, namespace, dim_alpha));
}

/// Flag-store mutations for one namespace.
///
/// Each mutation reads the token fresh from the store, persists only when the
/// observable set changes, and then asks for a perception refresh.
#[derive(Debug, Clone)]
pub struct VisibilityRules {
    namespace: String,
    party_kind: String,
}

impl VisibilityRules {
    pub fn new(namespace: impl Into<String>, party_kind: impl Into<String>) -> Self {
        VisibilityRules {
            namespace: namespace.into(),
            party_kind: party_kind.into(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn flags(&self, piece: &Piece) -> VisibilityFlagSet {
        VisibilityFlagSet::read(piece, &self.namespace)
    }

    /// Observers for `piece`, excluding its own actor.
    pub fn roster<S: Store>(&self, store: &S, piece: &Piece) -> Vec<RosterEntry> {
        resolve_roster(&store.actors(), &self.party_kind, piece.actor_id.as_ref())
    }

    fn load<S: Store>(&self, store: &S, piece_id: &PieceId) -> Result<Piece, HudError> {
        store
            .piece(piece_id)
            .ok_or_else(|| HudError::PieceMissing(piece_id.clone()))
    }

    async fn persist<S: Store>(
        &self,
        store: &S,
        piece_id: &PieceId,
        flags: &VisibilityFlagSet,
    ) -> Result<(), HudError> {
        match flags.to_write() {
            FlagWrite::Set(value) => {
                store
                    .set_flag(piece_id, &self.namespace, HIDDEN_FROM_FLAG, value)
                    .await?
            }
            FlagWrite::Unset => {
                store
                    .unset_flag(piece_id, &self.namespace, HIDDEN_FROM_FLAG)
                    .await?
            }
        }
        store.refresh_perception();
        Ok(())
    }

    /// # Returns
    /// * `Ok(true)` if the flag set changed.
    pub async fn hide_from<S: Store>(
        &self,
        store: &S,
        piece_id: &PieceId,
        observer: &ActorId,
    ) -> Result<bool, HudError> {
        let mut flags = self.flags(&self.load(store, piece_id)?);
        if !flags.hide_from(observer.clone()) {
            return Ok(false);
        }
        self.persist(store, piece_id, &flags).await?;
        log::debug!("{piece_id} hidden from {observer}");
        Ok(true)
    }

    pub async fn reveal_to<S: Store>(
        &self,
        store: &S,
        piece_id: &PieceId,
        observer: &ActorId,
    ) -> Result<bool, HudError> {
        let mut flags = self.flags(&self.load(store, piece_id)?);
        if !flags.reveal_to(observer) {
            return Ok(false);
        }
        self.persist(store, piece_id, &flags).await?;
        log::debug!("{piece_id} revealed to {observer}");
        Ok(true)
    }

    /// Sets the flags to the whole current roster. Does not set `hidden`.
    pub async fn hide_from_all<S: Store>(
        &self,
        store: &S,
        piece_id: &PieceId,
    ) -> Result<bool, HudError> {
        let piece = self.load(store, piece_id)?;
        let roster = self.roster(store, &piece);
        let mut flags = self.flags(&piece);
        if !flags.replace_with(roster.into_iter().map(|entry| entry.actor_id)) {
            return Ok(false);
        }
        self.persist(store, piece_id, &flags).await?;
        log::debug!("{piece_id} hidden from {} observers", flags.len());
        Ok(true)
    }

    /// Removes the flags and clears the token's own `hidden` field.
    pub async fn reveal_to_all<S: Store>(
        &self,
        store: &S,
        piece_id: &PieceId,
    ) -> Result<bool, HudError> {
        let piece = self.load(store, piece_id)?;
        let had_flags = piece.flag(&self.namespace, HIDDEN_FROM_FLAG).is_some();

        if had_flags {
            store
                .unset_flag(piece_id, &self.namespace, HIDDEN_FROM_FLAG)
                .await?;
        }
        let cleared = if piece.hidden {
            store
                .update_pieces(vec![(
                    piece_id.clone(),
                    PieceUpdate {
                        hidden: Some(false),
                        ..Default::default()
                    },
                )])
                .await
        } else {
            Ok(())
        };

        // The flag removal is persisted even when clearing `hidden` failed.
        let changed = had_flags || (piece.hidden && cleared.is_ok());
        if changed {
            store.refresh_perception();
        }
        cleared?;
        if changed {
            log::debug!("{piece_id} revealed to everyone");
        }
        Ok(changed)
    }
}
