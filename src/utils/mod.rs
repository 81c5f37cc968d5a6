pub mod clock;
pub mod db_utils;
pub mod geo;
pub mod location_cache;
pub mod nip_registry;
