//! Hierarchical label routing
//!
//! The mask classifier runs first. Its result selects one of three gender
//! classifiers, and the (mask, gender) pair selects one of six age
//! classifiers. The age bucket is collapsed into a bracket and the three
//! states are packed into a [`CompositeLabel`].

use std::sync::Arc;

use tracing::debug;

use crate::error::{CascadeError, Result};

use super::labels::{AgeBracket, AgeMod10Bucket, CompositeLabel, GenderState, MaskState};
use super::slot::ClassifierSlot;

/// A classifier mapping an image to a discrete label index.
///
/// Implementations must be safe to call from several threads at once.
pub trait Classifier<I: ?Sized>: Send + Sync {
    /// Number of labels this classifier can produce
    fn num_classes(&self) -> usize;

    /// Classify one image, returning a label index in `0..num_classes()`
    fn classify(&self, image: &I) -> Result<usize>;
}

impl<I: ?Sized, C: Classifier<I> + ?Sized> Classifier<I> for Arc<C> {
    fn num_classes(&self) -> usize {
        (**self).num_classes()
    }

    fn classify(&self, image: &I) -> Result<usize> {
        (**self).classify(image)
    }
}

impl<I: ?Sized, C: Classifier<I> + ?Sized> Classifier<I> for Box<C> {
    fn num_classes(&self) -> usize {
        (**self).num_classes()
    }

    fn classify(&self, image: &I) -> Result<usize> {
        (**self).classify(image)
    }
}

/// A complete set of classifiers, indexed by [`ClassifierSlot::ordinal`]
pub struct ClassifierBank<I: ?Sized> {
    classifiers: Box<[Box<dyn Classifier<I>>]>,
}

impl<I: ?Sized> ClassifierBank<I> {
    pub fn builder() -> ClassifierBankBuilder<I> {
        ClassifierBankBuilder::new()
    }

    fn get(&self, slot: ClassifierSlot) -> &dyn Classifier<I> {
        self.classifiers[slot.ordinal()].as_ref()
    }
}

/// Collects classifiers slot by slot and validates the set on `build`
pub struct ClassifierBankBuilder<I: ?Sized> {
    slots: Vec<Option<Box<dyn Classifier<I>>>>,
    duplicates: Vec<ClassifierSlot>,
}

impl<I: ?Sized> ClassifierBankBuilder<I> {
    pub fn new() -> Self {
        Self {
            slots: (0..ClassifierSlot::COUNT).map(|_| None).collect(),
            duplicates: Vec::new(),
        }
    }

    pub fn insert<C>(mut self, slot: ClassifierSlot, classifier: C) -> Self
    where
        C: Classifier<I> + 'static,
    {
        let entry = &mut self.slots[slot.ordinal()];
        if entry.is_some() {
            self.duplicates.push(slot);
        }
        *entry = Some(Box::new(classifier));
        self
    }

    /// Validate that every slot is populated exactly once with a classifier
    /// of the right cardinality.
    pub fn build(self) -> Result<ClassifierBank<I>> {
        if !self.duplicates.is_empty() {
            return Err(CascadeError::config(format!(
                "classifier slots assigned more than once: {}",
                join_slots(&self.duplicates)
            )));
        }

        let all = ClassifierSlot::all();
        let missing: Vec<ClassifierSlot> = all
            .iter()
            .copied()
            .filter(|slot| self.slots[slot.ordinal()].is_none())
            .collect();
        if !missing.is_empty() {
            return Err(CascadeError::config(format!(
                "missing {} of {} classifier slots: {}",
                missing.len(),
                ClassifierSlot::COUNT,
                join_slots(&missing)
            )));
        }

        for slot in all {
            if let Some(classifier) = &self.slots[slot.ordinal()] {
                if classifier.num_classes() != slot.num_classes() {
                    return Err(CascadeError::config(format!(
                        "classifier for {} produces {} classes, expected {}",
                        slot,
                        classifier.num_classes(),
                        slot.num_classes()
                    )));
                }
            }
        }

        let classifiers: Box<[Box<dyn Classifier<I>>]> =
            self.slots.into_iter().flatten().collect();
        Ok(ClassifierBank { classifiers })
    }
}

impl<I: ?Sized> Default for ClassifierBankBuilder<I> {
    fn default() -> Self {
        Self::new()
    }
}

fn join_slots(slots: &[ClassifierSlot]) -> String {
    slots
        .iter()
        .map(ClassifierSlot::key)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Intermediate states of one routing call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteTrace {
    pub mask: MaskState,
    pub gender: GenderState,
    pub bucket: AgeMod10Bucket,
    pub age: AgeBracket,
    pub label: CompositeLabel,
}

/// Stateless routing over a validated [`ClassifierBank`]
pub struct RoutingPolicy<I: ?Sized> {
    bank: ClassifierBank<I>,
}

impl<I: ?Sized> RoutingPolicy<I> {
    pub fn new(bank: ClassifierBank<I>) -> Self {
        Self { bank }
    }

    /// Compute the composite label for one image
    pub fn route(&self, image: &I) -> Result<CompositeLabel> {
        self.route_detailed(image).map(|trace| trace.label)
    }

    /// Like [`route`](Self::route), also returning every intermediate state
    pub fn route_detailed(&self, image: &I) -> Result<RouteTrace> {
        let mask = self.stage(ClassifierSlot::Mask, image, MaskState::from_index)?;
        let gender = self.stage(
            ClassifierSlot::Gender { mask },
            image,
            GenderState::from_index,
        )?;
        let bucket = self.stage(
            ClassifierSlot::Age { mask, gender },
            image,
            AgeMod10Bucket::from_index,
        )?;

        let age = bucket.bracket();
        let label = CompositeLabel::encode(mask, gender, age);

        debug!(
            "Routed: mask={}, gender={}, bucket={}, age={} -> {}",
            mask.as_str(),
            gender.as_str(),
            bucket.index(),
            age.as_str(),
            label
        );

        Ok(RouteTrace {
            mask,
            gender,
            bucket,
            age,
            label,
        })
    }

    fn stage<T>(
        &self,
        slot: ClassifierSlot,
        image: &I,
        decode: fn(usize) -> Option<T>,
    ) -> Result<T> {
        let idx = self.bank.get(slot).classify(image)?;
        decode(idx).ok_or_else(|| {
            CascadeError::classifier(
                slot,
                format!("label {} outside 0..{}", idx, slot.num_classes()),
            )
        })
    }
}
