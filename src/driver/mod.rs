//! Servo drivers.
//!
//! A driver implements the servo lifecycle for one deployment flavour. The
//! dispatcher only ever sees `dyn ServoDriver`; [`driver_for`] picks the
//! implementation from the servo's type.
//!
//! ```text
//!            driver_for(servo)
//!                   │
//!          ┌────────┴─────────┐
//!          ▼                  ▼
//!   ComposeDriver      KubernetesDriver
//!   (russh session)    (kubectl subprocess)
//! ```

pub mod compose;
pub mod kubernetes;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

pub use compose::ComposeDriver;
pub use kubernetes::KubernetesDriver;

use crate::config::AppConfig;
use crate::error::{Result, ServoError};
use crate::servo::{LogsOptions, Servo, ServoType};

/// Lifecycle operations every servo supports.
///
/// Every call is blocking from the caller's point of view and owns its own
/// transport; nothing is shared between calls.
#[async_trait]
pub trait ServoDriver: Send + Sync {
    async fn status(&self) -> Result<()>;

    async fn start(&self) -> Result<()>;

    async fn stop(&self) -> Result<()>;

    async fn restart(&self) -> Result<()>;

    /// With `follow` set this only returns once the token is cancelled or
    /// the remote side goes away.
    async fn logs(&self, options: &LogsOptions) -> Result<()>;

    /// Print the servo's `config.yaml`, highlighted.
    async fn config(&self) -> Result<()>;

    async fn shell(&self) -> Result<()>;
}

/// Select the driver for `servo`.
pub fn driver_for(
    servo: &Servo,
    config: &AppConfig,
    cancel: CancellationToken,
) -> Result<Box<dyn ServoDriver>> {
    match &servo.kind {
        ServoType::DockerCompose => Ok(Box::new(ComposeDriver::new(
            servo.clone(),
            config.into(),
            cancel,
        ))),
        ServoType::Kubernetes => Ok(Box::new(KubernetesDriver::new(
            servo.clone(),
            config.kubectl.clone(),
            cancel,
        ))),
        ServoType::Unknown(kind) => Err(ServoError::NoDriver {
            name: servo.name.clone(),
            kind: kind.clone(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_driver_for_known_types() {
        let config = AppConfig::default();
        assert!(driver_for(&Servo::compose("dev", "u", "h"), &config, CancellationToken::new()).is_ok());
        assert!(
            driver_for(&Servo::kubernetes("k", "ns", "dep"), &config, CancellationToken::new()).is_ok()
        );
    }

    #[test]
    fn test_driver_for_unknown_type_names_servo_and_type() {
        let mut servo = Servo::compose("edge", "u", "h");
        servo.kind = ServoType::Unknown("nomad".into());

        let err = driver_for(&servo, &AppConfig::default(), CancellationToken::new())
            .err()
            .unwrap();
        let msg = err.to_string();
        assert!(msg.contains("edge"), "{msg}");
        assert!(msg.contains("nomad"), "{msg}");
    }
}
