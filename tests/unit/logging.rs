use wingbot::logging::LogFormat;

#[test]
fn production_environments_log_json() {
    assert_eq!(LogFormat::for_environment("production"), LogFormat::Json);
    assert_eq!(LogFormat::for_environment("PROD"), LogFormat::Json);
}

#[test]
fn other_environments_log_pretty() {
    for env in ["sandbox", "staging", ""] {
        assert_eq!(LogFormat::for_environment(env), LogFormat::Pretty);
    }
}
