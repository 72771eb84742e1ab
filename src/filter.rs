//! Allow/deny rule chains over decoded event types.
//!
//! A `Pattern` constrains any subset of the decoded fields, the rest are
//! wildcards. A `Filter` is an ordered list of patterns, each tagged Allow or
//! Deny; the last rule matching an event decides, and an event no rule
//! matches is allowed.
//!
//! ```
//! use aetherus_lineage::filter::{Filter, Pattern};
//! use aetherus_lineage::mcrt::{Interface, SuperType};
//! use aetherus_lineage::{MatSurfId, Pipeline};
//!
//! let pla = MatSurfId::new(7);
//! let filter = Filter::builder()
//!     .deny(Pattern::any().pipeline(Pipeline::Emission).sub_type(1))
//!     .deny(Pattern::any().mat_surf_id(pla))
//!     .allow(Pattern::any().super_type(SuperType::Interface).mat_surf_id(pla))
//!     .build()
//!     .unwrap();
//! assert_eq!(filter.rules().len(), 3);
//! ```

use std::collections::VecDeque;

use log::trace;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ledger::{Ledger, LedgerError, Uid};
use crate::mcrt::{Interaction, Interface, Material, Reflector, ScatterDir, ScatterKind, SuperType};
use crate::raw;
use crate::{EventType, MatSurfId, Pipeline};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Polarity {
    Allow,
    Deny,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PatternError {
    #[error("{field} is constrained twice with different values")]
    Redefined { field: &'static str },
    #[error("{field} cannot be combined with the given {with}")]
    Inconsistent { field: &'static str, with: &'static str },
    #[error("sub_type {value:#x} exceeds 0x3f")]
    SubTypeOverflow { value: u8 },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("rule {rule}: {source}")]
pub struct FilterError {
    pub rule: usize,
    pub source: PatternError,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Pattern {
    pipeline: Option<Pipeline>,
    super_type: Option<SuperType>,
    interface: Option<Interface>,
    reflector: Option<Reflector>,
    interaction: Option<Interaction>,
    scatter: Option<ScatterKind>,
    direction: Option<ScatterDir>,
    sub_type: Option<u8>,
    mat_surf_id: Option<MatSurfId>,
    error: Option<PatternError>,
}

fn set<T: PartialEq>(slot: &mut Option<T>, value: T, field: &'static str, error: &mut Option<PatternError>) {
    match slot {
        Some(existing) if *existing != value => {
            error.get_or_insert(PatternError::Redefined { field });
        }
        _ => *slot = Some(value),
    }
}

fn check<T: PartialEq>(want: Option<T>, have: impl FnOnce() -> Option<T>) -> bool {
    match want {
        None => true,
        Some(want) => have() == Some(want),
    }
}

impl Pattern {
    /// Matches every event.
    pub fn any() -> Self {
        Self::default()
    }

    pub fn pipeline(mut self, pipeline: Pipeline) -> Self {
        set(&mut self.pipeline, pipeline, "pipeline", &mut self.error);
        self
    }

    pub fn super_type(mut self, super_type: SuperType) -> Self {
        set(&mut self.super_type, super_type, "super_type", &mut self.error);
        self
    }

    pub fn interface(mut self, interface: Interface) -> Self {
        set(&mut self.interface, interface, "interface", &mut self.error);
        self
    }

    pub fn reflector(mut self, reflector: Reflector) -> Self {
        set(&mut self.reflector, reflector, "reflector", &mut self.error);
        self
    }

    pub fn interaction(mut self, interaction: Interaction) -> Self {
        set(&mut self.interaction, interaction, "interaction", &mut self.error);
        self
    }

    pub fn scatter(mut self, scatter: ScatterKind) -> Self {
        set(&mut self.scatter, scatter, "scatter", &mut self.error);
        self
    }

    pub fn direction(mut self, direction: ScatterDir) -> Self {
        set(&mut self.direction, direction, "direction", &mut self.error);
        self
    }

    /// Raw 6-bit sub_type, for stages whose codes have no decoded form.
    pub fn sub_type(mut self, sub_type: u8) -> Self {
        set(&mut self.sub_type, sub_type, "sub_type", &mut self.error);
        self
    }

    pub fn mat_surf_id(mut self, mat_surf_id: MatSurfId) -> Self {
        set(&mut self.mat_surf_id, mat_surf_id, "mat_surf_id", &mut self.error);
        self
    }

    fn material_field(&self) -> Option<&'static str> {
        if self.interaction.is_some() {
            Some("interaction")
        } else if self.scatter.is_some() {
            Some("scatter")
        } else if self.direction.is_some() {
            Some("direction")
        } else {
            None
        }
    }

    fn mcrt_field(&self) -> Option<&'static str> {
        if self.super_type.is_some() {
            Some("super_type")
        } else if self.interface.is_some() {
            Some("interface")
        } else if self.reflector.is_some() {
            Some("reflector")
        } else {
            self.material_field()
        }
    }

    /// Reject field combinations no event can have.
    pub fn validate(&self) -> Result<(), PatternError> {
        use PatternError::Inconsistent;

        if let Some(error) = &self.error {
            return Err(error.clone());
        }
        if let Some(value) = self.sub_type {
            if value as u32 > raw::SUB_TYPE.max() {
                return Err(PatternError::SubTypeOverflow { value });
            }
        }
        if let (Some(pipeline), Some(field)) = (self.pipeline, self.mcrt_field()) {
            if pipeline != Pipeline::Mcrt {
                return Err(Inconsistent { field, with: "pipeline" });
            }
        }
        if let Some(super_type) = self.super_type {
            if self.interface.is_some() && super_type != SuperType::Interface {
                return Err(Inconsistent { field: "interface", with: "super_type" });
            }
            if self.reflector.is_some() && super_type != SuperType::Reflector {
                return Err(Inconsistent { field: "reflector", with: "super_type" });
            }
            if let Some(field) = self.material_field() {
                if super_type != SuperType::Material {
                    return Err(Inconsistent { field, with: "super_type" });
                }
            }
        }
        if self.interface.is_some() && self.reflector.is_some() {
            return Err(Inconsistent { field: "reflector", with: "interface" });
        }
        if let Some(field) = self.material_field() {
            if self.interface.is_some() {
                return Err(Inconsistent { field, with: "interface" });
            }
            if self.reflector.is_some() {
                return Err(Inconsistent { field, with: "reflector" });
            }
        }
        if let (Some(scatter), Some(interaction)) = (self.scatter, self.interaction) {
            if scatter.interaction() != interaction {
                return Err(Inconsistent { field: "scatter", with: "interaction" });
            }
        }
        if let (Some(_), Some(interaction)) = (self.direction, self.interaction) {
            if !matches!(interaction, Interaction::Inelastic | Interaction::Elastic) {
                return Err(Inconsistent { field: "direction", with: "interaction" });
            }
        }
        Ok(())
    }

    pub fn matches(&self, event: &EventType) -> bool {
        if !check(self.pipeline, || Some(event.pipeline())) {
            return false;
        }
        if !check(self.mat_surf_id, || Some(event.mat_surf_id)) {
            return false;
        }
        if !check(self.sub_type, || {
            event.raw_fields().ok().map(|fields| fields.sub_type as u8)
        }) {
            return false;
        }
        if self.mcrt_field().is_none() {
            return true;
        }

        let Some(mcrt) = event.as_mcrt() else {
            return false;
        };
        let material = mcrt.material();
        check(self.super_type, || Some(mcrt.super_type()))
            && check(self.interface, || mcrt.interface())
            && check(self.reflector, || mcrt.reflector())
            && check(self.interaction, || material.map(Material::interaction))
            && check(self.scatter, || material.and_then(Material::scatter))
            && check(self.direction, || material.and_then(Material::direction))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Rule {
    pub polarity: Polarity,
    pub pattern: Pattern,
}

/// How a whole lineage path is judged.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PathMode {
    /// Only the last event decides.
    Terminal,
    /// Every event must be retained.
    All,
    /// One retained event is enough.
    Any,
}

#[derive(Clone, Debug, Default)]
pub struct FilterBuilder {
    rules: Vec<Rule>,
}

impl FilterBuilder {
    pub fn allow(mut self, pattern: Pattern) -> Self {
        self.rules.push(Rule { polarity: Polarity::Allow, pattern });
        self
    }

    pub fn deny(mut self, pattern: Pattern) -> Self {
        self.rules.push(Rule { polarity: Polarity::Deny, pattern });
        self
    }

    pub fn build(self) -> Result<Filter, FilterError> {
        for (rule, entry) in self.rules.iter().enumerate() {
            entry
                .pattern
                .validate()
                .map_err(|source| FilterError { rule, source })?;
        }
        Ok(Filter { rules: self.rules })
    }
}

/// Immutable, validated rule chain.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Filter {
    rules: Vec<Rule>,
}

impl Filter {
    pub fn builder() -> FilterBuilder {
        FilterBuilder::default()
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn decide(&self, event: &EventType) -> Polarity {
        let decision = self
            .rules
            .iter()
            .rev()
            .find(|rule| rule.pattern.matches(event))
            .map_or(Polarity::Allow, |rule| rule.polarity);
        trace!("{:?} -> {:?}", event, decision);
        decision
    }

    pub fn decide_raw(&self, event: u32) -> Polarity {
        self.decide(&EventType::decode(event))
    }

    pub fn retains(&self, event: &EventType) -> bool {
        self.decide(event) == Polarity::Allow
    }

    fn events<'a>(path: &'a [Uid]) -> impl Iterator<Item = EventType> + 'a {
        path.iter().filter(|uid| !uid.is_root()).map(Uid::event_type)
    }

    // Paths are ordered root first, as returned by `Ledger::chain` and
    // `Ledger::paths`. The root sentinel is never judged.

    pub fn matches_terminal(&self, path: &[Uid]) -> bool {
        Self::events(path).last().is_none_or(|event| self.retains(&event))
    }

    pub fn matches_all(&self, path: &[Uid]) -> bool {
        Self::events(path).all(|event| self.retains(&event))
    }

    pub fn matches_any(&self, path: &[Uid]) -> bool {
        Self::events(path).any(|event| self.retains(&event))
    }

    pub fn retains_path(&self, path: &[Uid], mode: PathMode) -> bool {
        match mode {
            PathMode::Terminal => self.matches_terminal(path),
            PathMode::All => self.matches_all(path),
            PathMode::Any => self.matches_any(path),
        }
    }

    /// Downward paths from `seq_no` to each leaf that the filter retains.
    pub fn select(&self, ledger: &Ledger, seq_no: u32, mode: PathMode) -> Result<Vec<Vec<Uid>>, LedgerError> {
        Ok(ledger
            .paths(seq_no)?
            .into_iter()
            .filter(|path| self.retains_path(path, mode))
            .collect())
    }
}

struct SeqQueueEntry {
    uid: Uid,
    matched: usize,
}

/// Leaves whose root-to-leaf path contains `patterns` as an ordered,
/// not necessarily contiguous, subsequence.
pub fn find_forward_seq(ledger: &Ledger, patterns: &[Pattern]) -> Result<Vec<Uid>, FilterError> {
    for (rule, pattern) in patterns.iter().enumerate() {
        pattern.validate().map_err(|source| FilterError { rule, source })?;
    }
    let advance = |matched: usize, uid: &Uid| match patterns.get(matched) {
        Some(pattern) if pattern.matches(&uid.event_type()) => matched + 1,
        _ => matched,
    };

    let mut seq_queue: VecDeque<SeqQueueEntry> = ledger
        .roots()
        .into_iter()
        .map(|uid| SeqQueueEntry { matched: advance(0, &uid), uid })
        .collect();
    let mut found_uids = Vec::new();
    while let Some(entry) = seq_queue.pop_front() {
        let next_uids = ledger.children(entry.uid.seq_no);
        if next_uids.is_empty() {
            if entry.matched == patterns.len() {
                found_uids.push(entry.uid);
            }
            continue;
        }
        for next_uid in next_uids.into_iter().filter_map(|seq_no| ledger.lookup(seq_no)) {
            seq_queue.push_back(SeqQueueEntry {
                matched: advance(entry.matched, &next_uid),
                uid: next_uid,
            });
        }
    }
    Ok(found_uids)
}

// Declarative `Pattern` construction; `_` leaves a level unconstrained.
// 1. filter_seq!(Detection, _)                            -> any detection event
// 2. filter_seq!(Emission, 1, LASER)                      -> raw sub_type of a non-MCRT stage
// 3. filter_seq!(Mcrt, Interface, Refraction, PLA)        -> one super/sub code on one object
// 4. filter_seq!(Mcrt, Material, Elastic, Mie, Forward, _) -> down to scatter model and direction
// 5. filter_seq!([(Mcrt, Interface, _, PLA), (Detection, _)]) -> Vec<Pattern> for find_forward_seq
#[macro_export]
macro_rules! filter_seq {
    ([ $( ( $($rule:tt)* ) ),* $(,)? ]) => {
        ::std::vec![ $( $crate::filter_seq!($($rule)*) ),* ]
    };

    (@id $pattern:expr, _) => { $pattern };
    (@id $pattern:expr, $id:expr) => { $pattern.mat_surf_id($id) };
    (@scatter $pattern:expr, _) => { $pattern };
    (@scatter $pattern:expr, $scatter:ident) => {
        $pattern.scatter($crate::mcrt::ScatterKind::$scatter)
    };
    (@dir $pattern:expr, _) => { $pattern };
    (@dir $pattern:expr, $dir:ident) => {
        $pattern.direction($crate::mcrt::ScatterDir::$dir)
    };
    (@mcrt $super:ident) => {
        $crate::filter::Pattern::any()
            .pipeline($crate::Pipeline::Mcrt)
            .super_type($crate::mcrt::SuperType::$super)
    };

    (Mcrt, Material, $interaction:tt, $scatter:tt, $dir:tt, $($id:tt)+) => {
        $crate::filter_seq!(@id
            $crate::filter_seq!(@dir
                $crate::filter_seq!(@scatter
                    $crate::filter_seq!(Mcrt, Material, $interaction, _),
                    $scatter),
                $dir),
            $($id)+)
    };
    (Mcrt, $super:ident, _, $($id:tt)+) => {
        $crate::filter_seq!(@id $crate::filter_seq!(@mcrt $super), $($id)+)
    };
    (Mcrt, Interface, $sub:ident, $($id:tt)+) => {
        $crate::filter_seq!(@id
            $crate::filter_seq!(@mcrt Interface).interface($crate::mcrt::Interface::$sub),
            $($id)+)
    };
    (Mcrt, Reflector, $sub:ident, $($id:tt)+) => {
        $crate::filter_seq!(@id
            $crate::filter_seq!(@mcrt Reflector).reflector($crate::mcrt::Reflector::$sub),
            $($id)+)
    };
    (Mcrt, Material, $interaction:ident, $($id:tt)+) => {
        $crate::filter_seq!(@id
            $crate::filter_seq!(@mcrt Material).interaction($crate::mcrt::Interaction::$interaction),
            $($id)+)
    };
    ($pipeline:ident, $sub_type:literal, $($id:tt)+) => {
        $crate::filter_seq!(@id
            $crate::filter::Pattern::any()
                .pipeline($crate::Pipeline::$pipeline)
                .sub_type($sub_type),
            $($id)+)
    };
    ($pipeline:ident, $($id:tt)+) => {
        $crate::filter_seq!(@id
            $crate::filter::Pattern::any().pipeline($crate::Pipeline::$pipeline),
            $($id)+)
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcrt::Mcrt;
    use crate::{StageCode, mcrt_event};

    const BACKGROUND: u8 = 1;
    const PLA: MatSurfId = MatSurfId::new(7);
    const AIR: MatSurfId = MatSurfId::new(2);

    fn mcrt(mcrt: Mcrt, id: MatSurfId) -> EventType {
        EventType::mcrt(mcrt, id)
    }

    #[test]
    fn last_matching_rule_wins() {
        let filter = Filter::builder()
            .deny(Pattern::any().pipeline(Pipeline::Emission).sub_type(BACKGROUND))
            .deny(Pattern::any().mat_surf_id(PLA))
            .allow(Pattern::any().super_type(SuperType::Interface).mat_surf_id(PLA))
            .build()
            .unwrap();

        let refraction = mcrt(mcrt_event!(Interface, Refraction), PLA);
        assert_eq!(filter.decide(&refraction), Polarity::Allow);

        let sss = mcrt(mcrt_event!(Material, Elastic, HenyeyGreenstein, Any), PLA);
        assert_eq!(filter.decide(&sss), Polarity::Deny);

        let background = EventType::emission(StageCode::new(0, BACKGROUND), MatSurfId::new(9));
        assert_eq!(filter.decide(&background), Polarity::Deny);
        assert_eq!(filter.decide_raw(background.encode().unwrap()), Polarity::Deny);
    }

    #[test]
    fn unmatched_events_are_allowed() {
        let filter = Filter::builder()
            .deny(Pattern::any().mat_surf_id(PLA))
            .build()
            .unwrap();
        assert!(filter.retains(&mcrt(mcrt_event!(Interface, Reflection), AIR)));
        assert!(Filter::default().retains(&mcrt(mcrt_event!(Interface, Reflection), PLA)));
    }

    #[test]
    fn order_reversal_flips_the_outcome() {
        let wide = Pattern::any().mat_surf_id(PLA);
        let narrow = Pattern::any().interface(Interface::Reflection).mat_surf_id(PLA);
        let event = mcrt(mcrt_event!(Interface, Reflection), PLA);

        let allow_last = Filter::builder().deny(wide.clone()).allow(narrow.clone()).build().unwrap();
        let deny_last = Filter::builder().allow(narrow).deny(wide).build().unwrap();
        assert!(allow_last.retains(&event));
        assert!(!deny_last.retains(&event));
    }

    #[test]
    fn material_fields_match_decoded_values() {
        let raman = mcrt(mcrt_event!(Material, Inelastic, Raman, Side), AIR);
        let mie = mcrt(mcrt_event!(Material, Elastic, Mie, Forward), AIR);
        let absorb = mcrt(mcrt_event!(Material, Absorption), AIR);

        let inelastic = Pattern::any().interaction(Interaction::Inelastic);
        assert!(inelastic.matches(&raman));
        assert!(!inelastic.matches(&mie));

        let forward = Pattern::any().super_type(SuperType::Material).direction(ScatterDir::Forward);
        assert!(forward.matches(&mie));
        assert!(!forward.matches(&raman));
        assert!(!forward.matches(&absorb));

        let mie_only = Pattern::any().scatter(ScatterKind::Mie);
        assert!(mie_only.matches(&mie));
        assert!(!mie_only.matches(&absorb));

        // MCRT selectors never match other stages.
        let detection = EventType::detection(StageCode::default(), AIR);
        assert!(!Pattern::any().super_type(SuperType::Interface).matches(&detection));
        assert!(Pattern::any().mat_surf_id(AIR).matches(&detection));
    }

    #[test]
    fn raw_sub_type_matches_custom_material_codes() {
        let custom = EventType::decode(0x03b00007);
        assert_eq!(custom.as_mcrt(), Some(&Mcrt::Material(Material::Custom(0b110000))));
        assert!(Pattern::any().sub_type(0b110000).matches(&custom));
        assert!(Pattern::any().interaction(Interaction::Custom).matches(&custom));
        assert!(!Pattern::any().sub_type(0b110001).matches(&custom));
    }

    #[test]
    fn reflector_pattern_ignores_spare_bit() {
        let pattern = Pattern::any().reflector(Reflector::Diffuse);
        let plain = mcrt(mcrt_event!(Reflector, Diffuse), AIR);
        let spare = mcrt(Mcrt::Reflector { kind: Reflector::Diffuse, spare: true }, AIR);
        assert!(pattern.matches(&plain));
        assert!(pattern.matches(&spare));
    }

    #[test]
    fn malformed_patterns_fail_at_build_time() {
        let err = Filter::builder()
            .allow(Pattern::any())
            .deny(Pattern::any().super_type(SuperType::Material).interface(Interface::Reflection))
            .build()
            .unwrap_err();
        assert_eq!(err.rule, 1);
        assert_eq!(err.source, PatternError::Inconsistent { field: "interface", with: "super_type" });

        let cases = [
            (
                Pattern::any().pipeline(Pipeline::Emission).super_type(SuperType::Interface),
                PatternError::Inconsistent { field: "super_type", with: "pipeline" },
            ),
            (
                Pattern::any().interaction(Interaction::Elastic).scatter(ScatterKind::Raman),
                PatternError::Inconsistent { field: "scatter", with: "interaction" },
            ),
            (
                Pattern::any().interaction(Interaction::Absorption).direction(ScatterDir::Side),
                PatternError::Inconsistent { field: "direction", with: "interaction" },
            ),
            (
                Pattern::any().reflector(Reflector::Specular).scatter(ScatterKind::Mie),
                PatternError::Inconsistent { field: "scatter", with: "reflector" },
            ),
            (
                Pattern::any().mat_surf_id(PLA).mat_surf_id(AIR),
                PatternError::Redefined { field: "mat_surf_id" },
            ),
            (Pattern::any().sub_type(0x40), PatternError::SubTypeOverflow { value: 0x40 }),
        ];
        for (pattern, expected) in cases {
            assert_eq!(pattern.validate(), Err(expected));
        }
        assert!(Pattern::any().mat_surf_id(PLA).mat_surf_id(PLA).validate().is_ok());
    }

    fn branching_ledger() -> Ledger {
        let ledger = Ledger::new();
        let laser = EventType::emission(StageCode::default(), MatSurfId::new(0));
        ledger.insert(1, 0, laser.encode().unwrap()).unwrap();
        ledger.insert(2, 1, mcrt(mcrt_event!(Interface, Reflection), PLA).encode().unwrap()).unwrap();
        ledger.insert(3, 1, mcrt(mcrt_event!(Interface, Refraction), PLA).encode().unwrap()).unwrap();
        ledger
            .insert(4, 3, mcrt(mcrt_event!(Material, Elastic, Mie, Any), PLA).encode().unwrap())
            .unwrap();
        ledger
            .insert(5, 4, EventType::detection(StageCode::default(), MatSurfId::new(3)).encode().unwrap())
            .unwrap();
        ledger
    }

    fn seqs(paths: &[Vec<Uid>]) -> Vec<Vec<u32>> {
        let mut seqs: Vec<Vec<u32>> = paths
            .iter()
            .map(|path| path.iter().map(|uid| uid.seq_no).collect())
            .collect();
        seqs.sort();
        seqs
    }

    #[test]
    fn path_modes_differ() {
        let ledger = branching_ledger();
        let no_sss = Filter::builder()
            .deny(Pattern::any().super_type(SuperType::Material).mat_surf_id(PLA))
            .build()
            .unwrap();

        let through_pla = ledger.chain(5).unwrap();
        assert!(no_sss.matches_terminal(&through_pla));
        assert!(!no_sss.matches_all(&through_pla));
        assert!(no_sss.matches_any(&through_pla));

        assert_eq!(seqs(&no_sss.select(&ledger, 1, PathMode::All).unwrap()), vec![vec![1, 2]]);
        assert_eq!(
            seqs(&no_sss.select(&ledger, 1, PathMode::Terminal).unwrap()),
            vec![vec![1, 2], vec![1, 3, 4, 5]]
        );

        let detections = Filter::builder()
            .deny(Pattern::any())
            .allow(Pattern::any().pipeline(Pipeline::Detection))
            .build()
            .unwrap();
        assert_eq!(
            seqs(&detections.select(&ledger, 0, PathMode::Terminal).unwrap()),
            vec![vec![0, 1, 3, 4, 5]]
        );
        assert!(detections.matches_terminal(&[Uid::ROOT]));
    }

    #[test]
    fn forward_sequence_search() {
        let ledger = branching_ledger();
        let refraction_then_scatter = [
            Pattern::any().interface(Interface::Refraction),
            Pattern::any().interaction(Interaction::Elastic),
        ];
        let found = find_forward_seq(&ledger, &refraction_then_scatter).unwrap();
        assert_eq!(found.iter().map(|uid| uid.seq_no).collect::<Vec<_>>(), vec![5]);

        let scatter_then_refraction = [
            Pattern::any().interaction(Interaction::Elastic),
            Pattern::any().interface(Interface::Refraction),
        ];
        assert!(find_forward_seq(&ledger, &scatter_then_refraction).unwrap().is_empty());

        let mut every_leaf: Vec<u32> = find_forward_seq(&ledger, &[]).unwrap().iter().map(|uid| uid.seq_no).collect();
        every_leaf.sort();
        assert_eq!(every_leaf, vec![2, 5]);

        let bad = [Pattern::any().sub_type(0xFF)];
        assert_eq!(find_forward_seq(&ledger, &bad).unwrap_err().rule, 0);
    }

    #[test]
    fn filter_seq_builds_patterns() {
        assert_eq!(
            filter_seq!(Mcrt, Interface, Refraction, PLA),
            Pattern::any()
                .pipeline(Pipeline::Mcrt)
                .super_type(SuperType::Interface)
                .interface(Interface::Refraction)
                .mat_surf_id(PLA)
        );
        assert_eq!(
            filter_seq!(Mcrt, Material, Elastic, Mie, Forward, _),
            Pattern::any()
                .pipeline(Pipeline::Mcrt)
                .super_type(SuperType::Material)
                .interaction(Interaction::Elastic)
                .scatter(ScatterKind::Mie)
                .direction(ScatterDir::Forward)
        );
        assert_eq!(
            filter_seq!(Mcrt, Material, _, _, Side, AIR),
            Pattern::any()
                .pipeline(Pipeline::Mcrt)
                .super_type(SuperType::Material)
                .direction(ScatterDir::Side)
                .mat_surf_id(AIR)
        );
        assert_eq!(filter_seq!(Detection, _), Pattern::any().pipeline(Pipeline::Detection));
        assert_eq!(
            filter_seq!(Emission, 1, MatSurfId::new(4)),
            Pattern::any().pipeline(Pipeline::Emission).sub_type(1).mat_surf_id(MatSurfId::new(4))
        );

        let reflection = mcrt(mcrt_event!(Interface, Reflection), PLA);
        assert!(filter_seq!(Mcrt, Interface, _, PLA).matches(&reflection));
        assert!(!filter_seq!(Mcrt, Interface, Refraction, _).matches(&reflection));
        assert!(filter_seq!(Mcrt, Reflector, Diffuse, _).validate().is_ok());
        assert!(filter_seq!(Mcrt, Material, Absorption, AIR).validate().is_ok());
    }

    #[test]
    fn filter_seq_list_feeds_forward_search() {
        let ledger = branching_ledger();
        let patterns = filter_seq!([
            (Emission, _),
            (Mcrt, Interface, Refraction, PLA),
            (Mcrt, Material, Elastic, _, _, _),
        ]);
        assert_eq!(patterns.len(), 3);
        let found = find_forward_seq(&ledger, &patterns).unwrap();
        assert_eq!(found.iter().map(|uid| uid.seq_no).collect::<Vec<_>>(), vec![5]);

        let none: Vec<Pattern> = filter_seq!([]);
        assert!(none.is_empty());
    }
}
