pub fn generate_starter_config() -> String {
    r#"# =============================================================================
# LOGSTITCH CONFIGURATION
# =============================================================================
# Config file locations (in order of precedence):
#   1. Path specified via --config argument
#   2. ~/.config/logstitch/config.yml
#   3. /etc/logstitch/config.yml
#
# Values may reference environment variables as $env{NAME}.

# =============================================================================
# SERVERS
# =============================================================================
# One log stream per monitored Postgres server. Each server needs an input:
# either a local log file to follow, or the http receiver below.

servers:
  primary:
    # Local log file to follow
    log_tail: /var/log/postgresql/postgresql-16-main.log
    # Read existing content on startup instead of starting at the end
    log_tail_from_start: false
    # log_line_prefix as configured in postgresql.conf. Supported:
    #   '%m [%p] '
    #   '%m [%p] %q[user=%u,db=%d,app=%a] '
    #   '%t [%p]: [%l-1] user=%u,db=%d '
    #   '%t:%r:%u@%d:[%p]:'
    # Omit to detect the prefix per line.
    log_prefix: '%m [%p] '
    # Records matching any of these regexes are dropped before submission
    ignore_patterns:
      - '^connection received: '

  # replica:
  #   (no log_tail: receives logs pushed to /drain/replica or /events/replica)

# =============================================================================
# STREAM
# =============================================================================

stream:
  # How long a record waits for continuation lines before it is finalized
  ready_threshold: 3s
  # How often pending records are re-evaluated
  tick_interval: 3s
  # Upper bound of the per-server timer offset
  max_jitter: 500ms
  # Capacity of the shared record queue
  queue_len: 10000

# =============================================================================
# HTTP RECEIVER (optional)
# =============================================================================
# POST /drain/<server>   plain text, one log line per line
# POST /events/<server>  JSON array of {message, level, detail, occurred_at,
#                        backend_pid, log_line_number, log_line_number_chunk}

# http:
#   listen: 127.0.0.1:8089

# =============================================================================
# OUTPUT
# =============================================================================
# With neither spool_dir nor endpoint set, artifacts are only logged.

output:
  spool_dir: ~/.local/share/logstitch/spool
  # endpoint: https://collector.example.com/logs
  # submit_timeout: 30s
  # Failed submissions are retried with doubling delays, then dropped
  # submit_attempts: 5
  # retry_backoff: 1s
  # artifact_dir: /var/tmp/logstitch
"#
    .to_string()
}
