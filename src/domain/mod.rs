//! Domain models for parcel resolution
//!
//! Contains the invoice model and resolution logic without any I/O concerns.

mod id;
mod label;
mod invoice;
mod graph;
mod cycle;
mod satisfaction;
mod choice;
mod resolver;

#[cfg(test)]
mod fixtures;

pub use id::{GroupId, GroupName, GroupRef, IdError, ParcelId, GLOBAL_GROUP_DISPLAY};
pub use label::{
    AnnotationMap, FeatureMap, HashAlgorithm, Label, LabelError, RawLabel, DEFAULT_MEDIA_TYPE,
};
pub use invoice::{
    BindleSpec, Condition, Group, Invoice, Parcel, RawBindle, RawCondition, RawGroup, RawInvoice,
    RawParcel, SatisfiedBy, SchemaError, ValidationMode, BINDLE_VERSION_1,
};
pub use graph::{DependencyGraph, Edge, GraphError, Node};
pub use cycle::find_cycle;
pub use satisfaction::{AnyOfReading, Satisfaction, SatisfactionEvaluator};
pub use choice::{from_fn, Candidate, Choice, ChoiceMap, Chooser, FnChooser, SkipAll};
pub use resolver::{
    resolve, GroupReport, RequiredReason, ResolutionError, ResolutionFailure, ResolvePolicy,
    ResolvedManifest, Resolver,
};
