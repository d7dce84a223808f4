//! Area lights aggregation
//!
//! Aggregates individually-addressable lights into per-area groups. Each
//! area with at least one (non-excluded) light gets a read-only sensor
//! entity and a controllable switch entity reporting how many of its lights
//! are on; an "All Area Lights" pair covers every resolved light. A config
//! flow lets the user exclude specific lights from aggregation; the
//! exclusion list is the integration's only persisted configuration.

pub mod flow;
pub mod group;
pub mod hub;
pub mod resolver;
pub mod sensor;
pub mod switch;

pub use flow::{AreaLightsConfigFlow, AreaLightsOptionsFlow, FlowError, FlowResult};
pub use group::{Aggregate, LightGroup};
pub use hub::Hub;
pub use resolver::{lights_by_area, resolve_groups, AreaLights, LightRef};
pub use sensor::{setup_sensor_platform, SensorGroup};
pub use switch::{setup_switch_platform, SwitchGroup};

/// Integration domain
pub const DOMAIN: &str = "area_lights";

/// Config entry data key for the exclusion list
pub const CONF_EXCLUDED_ENTITIES: &str = "excluded_entities";

/// Entity domain the resolver filters on
pub const LIGHT_DOMAIN: &str = "light";
