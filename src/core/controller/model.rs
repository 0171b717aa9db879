//! The boiler controller GATT service model

use std::sync::Arc;

use uuid::Uuid;

use crate::core::bluetooth::constants::{
    UUID_ACCEPTED_USER_COMMANDS, UUID_AMBIENT_SENSOR, UUID_LOG_ENTRY, UUID_STATE,
    UUID_TARGET_TEMPERATURE, UUID_TIME_HEATED, UUID_TIME_IN_STATE, UUID_TIME_TO_GO,
    UUID_USER_REQUEST, UUID_WATER_SENSOR,
};
use crate::core::controller::codecs::{
    ControllerStateCodec, SensorCodec, TemperatureCodec, UserCommandCodec, UserCommandsCodec,
};
use crate::core::gatt::{
    GattService, ModifiableAttribute, RawBytes, ReadAttribute, Result, Scalar, UiDispatcher,
    WriteMode,
};

/// Typed view of the controller service. Cheap to clone; every clone shares
/// the same attributes.
#[derive(Clone)]
pub struct BoilerControllerService {
    service: Arc<GattService>,

    // status
    pub state: Arc<ReadAttribute<ControllerStateCodec>>,
    pub time_in_state: Arc<ReadAttribute<Scalar<u32>>>,
    pub time_heated: Arc<ReadAttribute<Scalar<u32>>>,
    pub time_to_go: Arc<ReadAttribute<Scalar<u32>>>,
    pub accepted_user_commands: Arc<ReadAttribute<UserCommandsCodec>>,
    pub user_request: Arc<ModifiableAttribute<UserCommandCodec>>,
    pub water_sensor: Arc<ReadAttribute<SensorCodec>>,
    pub ambient_sensor: Arc<ReadAttribute<SensorCodec>>,

    // configuration
    pub target_temperature: Arc<ModifiableAttribute<TemperatureCodec>>,

    // log
    pub log_entry: Arc<ReadAttribute<RawBytes>>,
}

impl BoilerControllerService {
    pub fn new(service_uuid: Uuid, dispatcher: UiDispatcher) -> Result<Self> {
        let service = GattService::new(service_uuid, dispatcher);

        Ok(Self {
            state: service.add_read_attribute(UUID_STATE, ControllerStateCodec)?,
            time_in_state: service.add_read_attribute(UUID_TIME_IN_STATE, Scalar::new())?,
            time_heated: service.add_read_attribute(UUID_TIME_HEATED, Scalar::new())?,
            time_to_go: service.add_read_attribute(UUID_TIME_TO_GO, Scalar::new())?,
            accepted_user_commands: service
                .add_read_attribute(UUID_ACCEPTED_USER_COMMANDS, UserCommandsCodec)?,
            user_request: service.add_modifiable_attribute(
                UUID_USER_REQUEST,
                UserCommandCodec,
                WriteMode::WithResponse,
            )?,
            water_sensor: service.add_read_attribute(UUID_WATER_SENSOR, SensorCodec)?,
            ambient_sensor: service.add_read_attribute(UUID_AMBIENT_SENSOR, SensorCodec)?,
            target_temperature: service.add_modifiable_attribute(
                UUID_TARGET_TEMPERATURE,
                TemperatureCodec,
                WriteMode::WithResponse,
            )?,
            log_entry: service.add_read_attribute(UUID_LOG_ENTRY, RawBytes)?,
            service,
        })
    }

    /// The untyped service, as registered with the connection manager.
    pub fn service(&self) -> &Arc<GattService> {
        &self.service
    }

    pub fn uuid(&self) -> Uuid {
        self.service.uuid()
    }
}
