use snowflake::SnowflakeIdBucket;
use std::sync::Mutex;

static ID_BUCKET: Mutex<Option<SnowflakeIdBucket>> = Mutex::new(None);

/// Initialize the snowflake ID generator.
///
/// `machine_id`: machine identifier (0-31)
/// `node_id`: node identifier (0-31)
pub fn init(machine_id: i32, node_id: i32) {
    let mut bucket = ID_BUCKET.lock().unwrap();
    *bucket = Some(SnowflakeIdBucket::new(machine_id, node_id));
}

/// Generate a snowflake ID in string form.
pub fn next_id() -> String {
    let mut bucket = ID_BUCKET.lock().unwrap();
    let gen = bucket.get_or_insert_with(|| SnowflakeIdBucket::new(1, 1));
    gen.get_id().to_string()
}
