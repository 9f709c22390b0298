use ember::config::{Config, DEFAULT_PORT};

// One test so the PORT mutations never race each other.
#[test]
fn test_config_port_from_env() {
    unsafe {
        std::env::remove_var("PORT");
    }
    assert_eq!(Config::load().port, DEFAULT_PORT);

    unsafe {
        std::env::set_var("PORT", "3000");
    }
    assert_eq!(Config::load().port, 3000);

    unsafe {
        std::env::set_var("PORT", " 9090 ");
    }
    assert_eq!(Config::load().port, 9090);

    unsafe {
        std::env::set_var("PORT", "not-a-port");
    }
    assert_eq!(Config::load().port, DEFAULT_PORT);

    unsafe {
        std::env::set_var("PORT", "70000");
    }
    assert_eq!(Config::load().port, DEFAULT_PORT);

    unsafe {
        std::env::remove_var("PORT");
    }
}

#[test]
fn test_config_clone() {
    let cfg1 = Config { port: 1234 };
    let cfg2 = cfg1.clone();
    assert_eq!(cfg1.port, cfg2.port);
}
