pub mod onnx_backend_factory;
