//! Error types for vislab.
//!
//! Startup failures (no window, no GPU) are fatal and surface to the caller of
//! [`run`](crate::run). Rotation and control errors are contract violations the
//! caller can react to.

use std::fmt;

/// Errors that can occur during GPU initialization.
#[derive(Debug)]
pub enum GpuError {
    /// Failed to create a surface for rendering.
    SurfaceCreation(wgpu::CreateSurfaceError),
    /// No compatible GPU adapter found.
    NoAdapter,
    /// Failed to create GPU device.
    DeviceCreation(wgpu::RequestDeviceError),
    /// The surface reported no usable texture format.
    UnsupportedSurface,
}

impl fmt::Display for GpuError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GpuError::SurfaceCreation(e) => write!(f, "Failed to create GPU surface: {}", e),
            GpuError::NoAdapter => write!(f, "No compatible GPU adapter found. Ensure your system has a GPU with Vulkan/Metal/DX12/GL support."),
            GpuError::DeviceCreation(e) => write!(f, "Failed to create GPU device: {}", e),
            GpuError::UnsupportedSurface => write!(f, "The rendering surface exposes no supported texture format"),
        }
    }
}

impl std::error::Error for GpuError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GpuError::SurfaceCreation(e) => Some(e),
            GpuError::DeviceCreation(e) => Some(e),
            _ => None,
        }
    }
}

impl From<wgpu::CreateSurfaceError> for GpuError {
    fn from(e: wgpu::CreateSurfaceError) -> Self {
        GpuError::SurfaceCreation(e)
    }
}

impl From<wgpu::RequestDeviceError> for GpuError {
    fn from(e: wgpu::RequestDeviceError) -> Self {
        GpuError::DeviceCreation(e)
    }
}

/// Errors that can occur when running an experiment.
#[derive(Debug)]
pub enum ExperimentError {
    /// Failed to create event loop.
    EventLoop(winit::error::EventLoopError),
    /// Failed to create window.
    Window(winit::error::OsError),
    /// GPU initialization failed.
    Gpu(GpuError),
}

impl fmt::Display for ExperimentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExperimentError::EventLoop(e) => write!(f, "Failed to create event loop: {}", e),
            ExperimentError::Window(e) => write!(f, "Failed to create window: {}", e),
            ExperimentError::Gpu(e) => write!(f, "GPU error: {}", e),
        }
    }
}

impl std::error::Error for ExperimentError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ExperimentError::EventLoop(e) => Some(e),
            ExperimentError::Window(e) => Some(e),
            ExperimentError::Gpu(e) => Some(e),
        }
    }
}

impl From<winit::error::EventLoopError> for ExperimentError {
    fn from(e: winit::error::EventLoopError) -> Self {
        ExperimentError::EventLoop(e)
    }
}

impl From<winit::error::OsError> for ExperimentError {
    fn from(e: winit::error::OsError) -> Self {
        ExperimentError::Window(e)
    }
}

impl From<GpuError> for ExperimentError {
    fn from(e: GpuError) -> Self {
        ExperimentError::Gpu(e)
    }
}

/// Errors returned by the cube rotation engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationError {
    /// A rotation already holds the pivot.
    Busy,
    /// The referenced cube does not exist in this grid.
    UnknownCube(usize),
    /// The engine was dropped before the rotation finished.
    Abandoned,
}

impl fmt::Display for RotationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RotationError::Busy => write!(f, "A rotation is already in progress; await it before starting another"),
            RotationError::UnknownCube(id) => write!(f, "Cube {} is not part of the grid", id),
            RotationError::Abandoned => write!(f, "The rotation was dropped before it completed"),
        }
    }
}

impl std::error::Error for RotationError {}

/// Errors returned when writing a debug control.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlError {
    /// No control is registered under this key.
    UnknownParam(String),
    /// The value does not match the control's kind.
    TypeMismatch {
        key: String,
        expected: &'static str,
    },
}

impl fmt::Display for ControlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlError::UnknownParam(key) => write!(f, "Unknown control '{}'", key),
            ControlError::TypeMismatch { key, expected } => {
                write!(f, "Control '{}' expects a {} value", key, expected)
            }
        }
    }
}

impl std::error::Error for ControlError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gpu_error_converts_into_experiment_error() {
        let err: ExperimentError = GpuError::NoAdapter.into();
        assert!(matches!(err, ExperimentError::Gpu(GpuError::NoAdapter)));
        assert!(err.to_string().contains("GPU error"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_control_error_message_names_key() {
        let err = ControlError::TypeMismatch {
            key: "bloomStrength".into(),
            expected: "float",
        };
        assert_eq!(err.to_string(), "Control 'bloomStrength' expects a float value");
    }
}
