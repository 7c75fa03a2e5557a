use citest_runtime::contract::run_runtime_contract_suite;
use citest_runtime::DockerCli;

#[test]
#[ignore = "needs a reachable docker daemon"]
fn docker_cli_contract() {
    let docker = DockerCli::default();
    run_runtime_contract_suite(&docker, "busybox:latest").unwrap();
}
