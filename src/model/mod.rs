pub mod issue;
pub mod outcome;
pub mod work_order;
