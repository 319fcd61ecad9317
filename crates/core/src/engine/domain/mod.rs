pub mod backend_factory;
pub mod face_engine;
pub mod handle_registry;
