pub mod bounding_box;
pub mod for_each_ref;
pub mod math_helper;
pub mod thread_dispatcher;
