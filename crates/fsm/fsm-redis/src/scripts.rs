//! Server-side Lua for writes that must be atomic across the metadata hash and the data key.
//!
//! Timestamps and TTL arguments are computed by the client; an empty string argument means
//! "not given".

use redis::Script;

/// KEYS: meta, data. ARGV: default state, now, ttl ms, expires_at.
/// Creates the record when the metadata hash is missing; returns the current state.
const GET_OR_CREATE: &str = r#"
if redis.call('EXISTS', KEYS[1]) == 0 then
  redis.call('DEL', KEYS[2])
  redis.call('HSET', KEYS[1], 'state', ARGV[1], 'created_at', ARGV[2], 'updated_at', ARGV[2])
  if ARGV[3] ~= '' then
    redis.call('HSET', KEYS[1], 'expires_at', ARGV[4])
    redis.call('PEXPIRE', KEYS[1], ARGV[3])
  end
end
return redis.call('HGET', KEYS[1], 'state')
"#;

/// KEYS: meta, data.
/// ARGV: now, state, data json, create ('1'/'0'), ttl ms, expires_at, default ttl ms,
/// default expires_at.
/// Returns 0 when the record is missing and creation is not allowed, 1 otherwise.
const WRITE: &str = r#"
local exists = redis.call('EXISTS', KEYS[1])
if exists == 0 then
  if ARGV[4] ~= '1' then
    return 0
  end
  redis.call('DEL', KEYS[2])
  redis.call('HSET', KEYS[1], 'state', '*', 'created_at', ARGV[1])
end
redis.call('HSET', KEYS[1], 'updated_at', ARGV[1])
if ARGV[2] ~= '' then
  redis.call('HSET', KEYS[1], 'state', ARGV[2])
end
if ARGV[3] ~= '' then
  redis.call('SET', KEYS[2], ARGV[3])
end
local ttl = ARGV[5]
local expires_at = ARGV[6]
if ttl == '' and exists == 0 then
  ttl = ARGV[7]
  expires_at = ARGV[8]
end
if ttl ~= '' then
  redis.call('HSET', KEYS[1], 'expires_at', expires_at)
  redis.call('PEXPIRE', KEYS[1], ttl)
  if redis.call('EXISTS', KEYS[2]) == 1 then
    redis.call('PEXPIRE', KEYS[2], ttl)
  end
elseif ARGV[3] ~= '' then
  local remaining = redis.call('PTTL', KEYS[1])
  if remaining > 0 then
    redis.call('PEXPIRE', KEYS[2], remaining)
  end
end
return 1
"#;

pub(crate) struct Scripts {
    pub(crate) get_or_create: Script,
    pub(crate) write: Script,
}

impl Scripts {
    pub(crate) fn new() -> Self {
        Self {
            get_or_create: Script::new(GET_OR_CREATE),
            write: Script::new(WRITE),
        }
    }
}
