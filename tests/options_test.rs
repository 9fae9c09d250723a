//! 消费者配置校验测试

use std::time::Duration;

use flare_kafka_consumer::kafka::{ConsumeMode, ConsumerOptions, RawConsumerOptions, TracingLogger};
use flare_kafka_consumer::ValidationError;
use serde_json::{Value, json};

/// 四个必填项齐全的 JSON 配置
fn base_json() -> Value {
    json!({
        "name": "order-consumer",
        "host": "localhost:9092",
        "groupId": "order-group",
        "topic": "orders"
    })
}

fn validate_json(value: Value) -> Result<ConsumerOptions, ValidationError> {
    let raw = RawConsumerOptions::from_json(value).expect("Failed to parse raw options");
    ConsumerOptions::validate(&raw)
}

fn with_field(field: &str, value: Value) -> Value {
    let mut config = base_json();
    config[field] = value;
    config
}

/// 测试：缺少必填项时按优先级报告
#[test]
fn test_missing_required_options() {
    for field in ["name", "host", "groupId", "topic"] {
        let mut config = base_json();
        config.as_object_mut().unwrap().remove(field);

        let err = validate_json(config).expect_err("validation should fail");
        assert_eq!(err, ValidationError::MissingOption(field));
        assert_eq!(err.to_string(), format!("Option '{}' is required", field));
    }

    // 全部缺失时先报告 name
    let err = validate_json(json!({})).expect_err("validation should fail");
    assert_eq!(err, ValidationError::MissingOption("name"));

    // host 和 topic 都缺失时先报告 host
    let err = validate_json(json!({ "name": "c", "groupId": "g" }))
        .expect_err("validation should fail");
    assert_eq!(err, ValidationError::MissingOption("host"));
}

/// 测试：空字符串等同于缺失
#[test]
fn test_empty_string_is_missing() {
    let err = validate_json(with_field("groupId", json!(""))).expect_err("validation should fail");
    assert_eq!(err, ValidationError::MissingOption("groupId"));

    let raw = RawConsumerOptions::new("", "localhost:9092", "g", "t");
    assert_eq!(
        ConsumerOptions::validate(&raw).unwrap_err(),
        ValidationError::MissingOption("name")
    );
}

/// 测试：可选项缺省值
#[test]
fn test_defaults() {
    let options = validate_json(base_json()).expect("validation should pass");

    assert_eq!(options.name(), "order-consumer");
    assert_eq!(options.host(), "localhost:9092");
    assert_eq!(options.group_id(), "order-group");
    assert_eq!(options.topic(), "orders");
    assert_eq!(options.mode(), ConsumeMode::NonFlowing);
    assert_eq!(options.connect_timeout(), Duration::from_millis(5000));
    assert_eq!(options.num_msg_fetch_per_time(), 1);
    assert_eq!(options.interval_fetch_message(), Duration::from_millis(10));
    assert!(options.native_client_config().is_none());
    assert!(options.native_topic_config().is_none());
    assert!(options.logger().is_none());
}

/// 测试：显式配置全部生效
#[test]
fn test_explicit_values() {
    let raw = RawConsumerOptions::new("c", "broker-1:9092,broker-2:9092", "g", "t")
        .with_mode("flowing")
        .with_connect_timeout(1500)
        .with_num_msg_fetch_per_time(20)
        .with_interval_fetch_message(250)
        .with_native_client_config("fetch.wait.max.ms", 50)
        .with_native_topic_config("auto.offset.reset", "latest")
        .with_logger(TracingLogger::new("c"));

    let options = ConsumerOptions::validate(&raw).expect("validation should pass");

    assert_eq!(options.mode(), ConsumeMode::Flowing);
    assert_eq!(options.connect_timeout_ms(), 1500);
    assert_eq!(options.num_msg_fetch_per_time(), 20);
    assert_eq!(options.interval_fetch_message_ms(), 250);
    assert_eq!(
        options
            .native_client_config()
            .and_then(|config| config.get("fetch.wait.max.ms")),
        Some(&json!(50))
    );
    assert_eq!(
        options
            .native_topic_config()
            .and_then(|config| config.get("auto.offset.reset")),
        Some(&json!("latest"))
    );
    assert!(options.logger().is_some());
}

/// 测试：mode 只接受 flowing / non-flowing
#[test]
fn test_invalid_mode() {
    for mode in [json!("streaming"), json!("Flowing"), json!(1)] {
        let err = validate_json(with_field("mode", mode)).expect_err("validation should fail");
        assert_eq!(err, ValidationError::InvalidOption("mode"));
        assert_eq!(
            err.to_string(),
            "Option 'mode' should be set 'flowing' or 'non-flowing'"
        );
    }

    let options = validate_json(with_field("mode", json!("non-flowing"))).unwrap();
    assert_eq!(options.mode(), ConsumeMode::NonFlowing);
}

/// 测试：数值项必须是整数
#[test]
fn test_numeric_options_require_integer() {
    for field in ["connectTimeout", "intervalFetchMessage", "numMsgFetchPerTime"] {
        for value in [json!("100"), json!(1.5), json!(true), json!([1])] {
            let err = validate_json(with_field(field, value.clone()))
                .expect_err("validation should fail");
            assert_eq!(err, ValidationError::InvalidType(field), "{} = {}", field, value);
            assert_eq!(err.to_string(), format!("Option '{}' should be integer", field));
        }
    }
}

/// 测试：数值项必须大于 0
#[test]
fn test_numeric_options_require_positive() {
    for field in ["connectTimeout", "intervalFetchMessage", "numMsgFetchPerTime"] {
        for value in [json!(0), json!(-5)] {
            let err = validate_json(with_field(field, value)).expect_err("validation should fail");
            assert_eq!(err, ValidationError::OutOfRange(field));
            assert_eq!(
                err.to_string(),
                format!("Option '{}' should greater than 0", field)
            );
        }
    }
}

/// 测试：小数部分为 0 的浮点数视为整数
#[test]
fn test_integral_float_accepted() {
    let options = validate_json(with_field("connectTimeout", json!(3000.0))).unwrap();
    assert_eq!(options.connect_timeout_ms(), 3000);
}

/// 测试：数值项按 connectTimeout、intervalFetchMessage、numMsgFetchPerTime 顺序检查
#[test]
fn test_numeric_check_order() {
    let mut config = base_json();
    config["numMsgFetchPerTime"] = json!(0);
    config["intervalFetchMessage"] = json!("fast");
    assert_eq!(
        validate_json(config.clone()).unwrap_err(),
        ValidationError::InvalidType("intervalFetchMessage")
    );

    config["connectTimeout"] = json!(-1);
    assert_eq!(
        validate_json(config).unwrap_err(),
        ValidationError::OutOfRange("connectTimeout")
    );
}

/// 测试：透传配置不做校验，原样保存
#[test]
fn test_pass_through_values_kept_verbatim() {
    let client = json!({ "client.id": "c-1", "fetch.min.bytes": 1, "debug": null });
    let topic = json!({ "auto.offset.reset": ["earliest"] });

    let mut config = with_field("nativeClientConfig", client.clone());
    config["nativeTopicConfig"] = topic.clone();
    let options = validate_json(config).expect("validation should pass");

    assert_eq!(
        options.native_client_config().cloned().map(Value::Object),
        Some(client)
    );
    assert_eq!(
        options.native_topic_config().cloned().map(Value::Object),
        Some(topic)
    );
}

/// 测试：从 TOML 加载配置
#[test]
fn test_load_from_toml() {
    let raw = RawConsumerOptions::from_toml_str(
        r#"
        name = "order-consumer"
        host = "localhost:9092"
        groupId = "order-group"
        topic = "orders"
        mode = "flowing"
        connectTimeout = 2000

        [nativeClientConfig]
        "client.id" = "flare-1"
        "#,
    )
    .expect("Failed to parse TOML");

    let options = ConsumerOptions::try_from(&raw).expect("validation should pass");
    assert_eq!(options.mode(), ConsumeMode::Flowing);
    assert_eq!(options.connect_timeout_ms(), 2000);
    assert_eq!(
        options.native_client_config().unwrap()["client.id"],
        "flare-1"
    );
}

/// 测试：配置文件不存在时返回错误
#[test]
fn test_load_missing_file() {
    assert!(RawConsumerOptions::load_from_file("/nonexistent/consumer.toml").is_err());
}
