//! Both relays against a device in loopback mode

use hal_e1000::E1000Config;
use ipc::NetRequest;
use services_network::{InputRelay, OutputRelay, Served};
use sim_kernel::test_utils::complete_transmits;
use tests_resilience::{play_stack, Pipeline};

#[test]
fn test_output_comes_back_as_input() {
    let nic = E1000Config {
        loopback: true,
        ..E1000Config::default()
    };
    let mut p = Pipeline::with_config(Default::default(), nic).unwrap();
    let input_env = p.kernel.create_env();
    let ping = b"\xff\xff\xff\xff\xff\xffPING".to_vec();
    play_stack(&mut p.kernel, p.stack, p.relay, vec![ping.clone()]);

    let output = OutputRelay::new(p.stack);
    let served = output
        .serve_one(&mut p.kernel.context(p.relay).unwrap())
        .unwrap();
    assert_eq!(served, Served::Transmitted(ping.len()));
    p.kernel.clear_yield_hook();

    assert_eq!(complete_transmits(&mut p.kernel), vec![ping.clone()]);

    p.arm_stack().unwrap();
    let input = InputRelay::new(p.stack);
    input
        .forward_one(&mut p.kernel.context(input_env).unwrap())
        .unwrap();
    assert!(p.stack_receipt().unwrap().is_some());
    assert_eq!(p.stack_frame().unwrap(), ping);

    let audit = p.kernel.ipc_audit();
    assert_eq!(
        audit.deliveries_to(p.relay),
        vec![(p.stack, NetRequest::Output.value())]
    );
    assert_eq!(
        audit.deliveries_to(p.stack),
        vec![(input_env, NetRequest::Input.value())]
    );
}
