//! 🍇欢迎光临🍓
//!
//! 涵盖了本 crate 一系列常用的功能.

pub use crate::Idx3d;
pub use crate::{SegError, SegResult};

pub use crate::data::{Calibration, Connectivity, GridAttr, Mask, Neighbourhood, ScalarField};

pub use crate::region::{MedianOfMap, PopulationFilter, Region, RegionPopulation, RegionStatistic};

pub use crate::watershed::{run_watershed, PropagationCriterion, SeedSet, WatershedConfig};

pub use crate::cluster::{
    ascending_value, build_interfaces, contract, contract_by, Contraction, DivisionCriterion,
    EdmFusion, FusionCandidate, FusionCheck, FusionRecord, Interface, InterfaceKey, InterfaceSet,
    InterfaceValue,
};

pub use crate::edm::{distance_map, EdmInterfaceValue, SplitAndMergeEdm, SplitMergeConfig};

pub use crate::spot::{segment_spots, segment_spots_from_seeds, Spot, SpotConfig, SpotSegmentation};

pub use crate::frames::{segment_frames, split_and_merge_frames};
