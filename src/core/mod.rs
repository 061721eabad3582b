// Core modules implementing the keyframe codec, crop expressions, and error modeling.
pub mod crop;
pub mod error;
pub mod keyframe;
pub mod track;
