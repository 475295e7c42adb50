pub mod labels;

pub use labels::{LabelPlan, LabelReconciler, FIX_ME_LABEL, NEEDS_REBASE_LABEL};
