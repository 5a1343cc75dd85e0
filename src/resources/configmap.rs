//! ConfigMap generation and the `flink-conf.yaml` wire format.
//!
//! Flink 1.12 reads its configuration as flat `key: value` lines, so the
//! document is rendered line by line rather than through a YAML serializer
//! that might quote numeric strings.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::ConfigMap;

use crate::naming::ClusterName;
use crate::resources::ClusterContext;
use crate::resources::common::{
    BLOB_SERVER_PORT, JOB_MANAGER_RPC_PORT, QUERY_STATE_PORT, TASK_MANAGER_RPC_PORT, object_meta,
    standard_labels,
};

/// ConfigMap key holding the Flink configuration
pub const FLINK_CONF_FILE: &str = "flink-conf.yaml";

/// ConfigMap key holding the logging configuration
pub const LOGBACK_FILE: &str = "logback-console.xml";

const LOGBACK_CONSOLE_XML: &str = r#"<configuration>
    <appender name="console" class="ch.qos.logback.core.ConsoleAppender">
        <encoder>
            <pattern>%d{yyyy-MM-dd HH:mm:ss.SSS} [%thread] %-5level %logger{60} %X{sourceThread} - %msg%n</pattern>
        </encoder>
    </appender>

    <appender name="file" class="ch.qos.logback.core.FileAppender">
        <file>${log.file}</file>
        <append>false</append>
        <encoder>
            <pattern>%d{yyyy-MM-dd HH:mm:ss.SSS} [%thread] %-5level %logger{60} %X{sourceThread} - %msg%n</pattern>
        </encoder>
    </appender>

    <root level="INFO">
        <appender-ref ref="console"/>
        <appender-ref ref="file"/>
    </root>

    <logger name="akka" level="INFO"/>
    <logger name="org.apache.kafka" level="INFO"/>
    <logger name="org.apache.hadoop" level="INFO"/>
    <logger name="org.apache.zookeeper" level="INFO"/>
    <logger name="org.apache.flink.shaded.akka.org.jboss.netty.channel.DefaultChannelPipeline" level="ERROR"/>
</configuration>
"#;

/// Built-in Flink settings for a cluster, before job and user overrides
pub fn default_flink_configuration(cluster: &ClusterName) -> BTreeMap<String, String> {
    let defaults = [
        ("taskmanager.rpc.port", TASK_MANAGER_RPC_PORT.to_string()),
        ("jobmanager.rpc.port", JOB_MANAGER_RPC_PORT.to_string()),
        ("blob.server.port", BLOB_SERVER_PORT.to_string()),
        ("queryable-state.proxy.ports", QUERY_STATE_PORT.to_string()),
        ("parallelism.default", "1".to_string()),
        ("taskmanager.numberOfTaskSlots", "2".to_string()),
        ("taskmanager.memory.managed.size", "24m".to_string()),
        ("taskmanager.memory.task.heap.size", "3200m".to_string()),
        ("jobmanager.memory.flink.size", "2048m".to_string()),
        ("jobmanager.memory.jvm-metaspace.size", "2048m".to_string()),
        ("web.upload.dir", "/opt/flink/target".to_string()),
        ("jobmanager.rpc.address", cluster.service()),
    ];
    defaults
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}

/// Effective configuration: defaults, then the job block, then user overrides
pub fn effective_flink_configuration(ctx: &ClusterContext<'_>) -> BTreeMap<String, String> {
    let mut conf = default_flink_configuration(&ctx.name);

    if let Some(job) = &ctx.request.job {
        if let Some(jar) = &job.jar_uri {
            conf.insert("pipeline.jars".to_string(), jar.clone());
        }
        if let Some(parallelism) = job.parallelism {
            conf.insert("parallelism.default".to_string(), parallelism.to_string());
        }
    }

    for (key, value) in &ctx.request.flink_configuration {
        conf.insert(key.clone(), value.clone());
    }
    conf
}

/// Render a configuration as a flat `key: value` document
pub fn render_flink_conf(conf: &BTreeMap<String, String>) -> String {
    let mut out = String::new();
    for (key, value) in conf {
        out.push_str(key);
        out.push_str(": ");
        out.push_str(value);
        out.push('\n');
    }
    out
}

/// Parse a flat `key: value` document.
///
/// Blank lines and `#` comments are skipped, matching surrounding quotes are
/// stripped, and lines without a separator are ignored.
pub fn parse_flink_conf(document: &str) -> BTreeMap<String, String> {
    document
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| {
            let (key, value) = line.split_once(':')?;
            let key = key.trim();
            if key.is_empty() {
                return None;
            }
            Some((key.to_string(), unquote(value.trim()).to_string()))
        })
        .collect()
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if let Some(inner) = value
            .strip_prefix(quote)
            .and_then(|v| v.strip_suffix(quote))
        {
            return inner;
        }
    }
    value
}

/// ConfigMap data for a configuration document
pub fn config_map_data(conf: &BTreeMap<String, String>) -> BTreeMap<String, String> {
    BTreeMap::from([
        (FLINK_CONF_FILE.to_string(), render_flink_conf(conf)),
        (LOGBACK_FILE.to_string(), LOGBACK_CONSOLE_XML.to_string()),
    ])
}

/// Generate the cluster ConfigMap.
pub fn generate_config_map(ctx: &ClusterContext<'_>) -> ConfigMap {
    ConfigMap {
        metadata: object_meta(
            ctx.name.config_map(),
            ctx.namespace(),
            standard_labels(&ctx.name, ctx.owner()),
        ),
        data: Some(config_map_data(&effective_flink_configuration(ctx))),
        ..Default::default()
    }
}
