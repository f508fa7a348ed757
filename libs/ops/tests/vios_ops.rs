//! Service-partition operation flows against scripted transports.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::json;

use hmc_converge::{ConvergeError, ManualClock, ParameterSet, Poller};
use hmc_ops::vios;
use hmc_transport::{ScriptedRest, ScriptedTransport, TransportError};

fn poller() -> Poller {
    Poller::new(Arc::new(ManualClock::new()))
}

fn auth() -> BTreeMap<String, String> {
    let mut auth = BTreeMap::new();
    auth.insert("username".to_string(), "hscroot".to_string());
    auth.insert("password".to_string(), "secret".to_string());
    auth
}

fn base_params() -> ParameterSet {
    ParameterSet::new()
        .with("hmc_host", "hmc01")
        .with("hmc_auth", auth())
        .with("system_name", "sys1")
}

fn nim_params() -> ParameterSet {
    base_params()
        .with("name", "vios1")
        .with("nim_ip", "10.0.0.5")
        .with("nim_gateway", "10.0.1.1")
        .with("vios_ip", "10.0.1.20")
        .with("nim_subnetmask", "255.255.255.0")
}

#[tokio::test]
async fn create_converges_on_an_existing_partition() {
    let transport =
        ScriptedTransport::new().respond("name=vios1,state=Running,rmc_state=active,lpar_id=1");

    let params = base_params().with("name", "vios1");
    let result = vios::create(&transport, &params).await.unwrap();

    assert!(!result.changed);
    assert_eq!(result.info.unwrap()["name"], "vios1");
    assert_eq!(transport.count_matching("mksyscfg"), 0);
}

#[tokio::test]
async fn create_swallows_the_lookup_failure_code_and_proceeds() {
    let transport = ScriptedTransport::new()
        .fail(TransportError::command(
            "HSCL8012 The partition named vios1 was not found.",
        ))
        .respond("") // mksyscfg
        .respond("name=vios1,state=Not Activated,lpar_id=3");

    let params = base_params().with("name", "vios1");
    let result = vios::create(&transport, &params).await.unwrap();

    assert!(result.changed);
    assert_eq!(transport.count_matching("mksyscfg"), 1);
    assert!(transport.executed()[1].contains("lpar_env=vioserver"));
}

#[tokio::test]
async fn create_surfaces_other_precheck_failures_verbatim() {
    let transport = ScriptedTransport::new().fail(TransportError::command(
        "HSCL1402 An unexpected error occurred.",
    ));

    let params = base_params().with("name", "vios1");
    let err = vios::create(&transport, &params).await.unwrap_err();

    assert!(matches!(err, ConvergeError::Transport { .. }));
    assert!(err.to_string().contains("HSCL1402"));
    assert_eq!(transport.count_matching("mksyscfg"), 0);
}

#[tokio::test]
async fn create_rejects_unsupported_partition_settings() {
    let transport = ScriptedTransport::new();
    let mut settings = BTreeMap::new();
    settings.insert("lpar_env".to_string(), "aixlinux".to_string());

    let params = base_params().with("name", "vios1").with("settings", settings);
    let err = vios::create(&transport, &params).await.unwrap_err();

    assert_eq!(err.to_string(), "Invalid parameters: lpar_env");
    assert!(transport.executed().is_empty());
}

#[tokio::test]
async fn install_rejects_a_short_deadline_before_any_remote_call() {
    let transport = ScriptedTransport::new();
    let params = nim_params().with("timeout", 5_i64);

    let err = vios::install(&transport, &poller(), &params)
        .await
        .unwrap_err();

    assert!(err.is_validation());
    assert!(err.to_string().contains("10 mins"));
    assert!(transport.executed().is_empty());
}

#[tokio::test]
async fn install_refuses_both_media_at_once() {
    let transport = ScriptedTransport::new();
    let params = nim_params().with("image_dir", "images");

    let err = vios::install(&transport, &poller(), &params)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("Cannot provide both"));

    let neither = base_params().with("name", "vios1");
    let err = vios::install(&transport, &poller(), &neither)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("nim_ip and image_dir"));
    assert!(transport.executed().is_empty());
}

#[tokio::test]
async fn nim_install_with_active_rmc_converges_changed() {
    let transport = ScriptedTransport::new()
        .respond("") // installios
        .respond("Running\n")
        .respond("active\n")
        .respond("\n") // ref code
        .respond("name=vios1,state=Running,rmc_state=active");

    let params = nim_params().with("location_code", "U78AB.001.WZSH5ZY-P1-C7-T2");
    let result = vios::install(&transport, &poller(), &params).await.unwrap();

    assert!(result.changed);
    assert!(result.warning.is_none());
    assert_eq!(transport.count_matching("installios"), 1);
    assert!(transport.executed()[0].contains("-l U78AB.001.WZSH5ZY-P1-C7-T2"));
}

#[tokio::test]
async fn nim_install_without_rmc_and_clear_ref_code_is_a_soft_success() {
    let transport = ScriptedTransport::new()
        .respond("") // installios
        .respond("Running\n")
        .respond("inactive\n")
        .respond("00\n")
        .respond("name=vios1,state=Running,rmc_state=inactive");

    let params = nim_params().with("location_code", "U78AB-P1-C7-T2");
    let result = vios::install(&transport, &poller(), &params).await.unwrap();

    assert!(result.changed);
    let warning = result.warning.unwrap();
    assert!(!warning.is_empty());
    assert!(warning.contains("firewall"));
}

#[tokio::test]
async fn nim_install_with_a_reference_code_fails_naming_it() {
    let transport = ScriptedTransport::new()
        .respond("") // installios
        .respond("Running\n")
        .respond("inactive\n")
        .respond("E1234\n");

    let params = nim_params().with("location_code", "U78AB-P1-C7-T2");
    let err = vios::install(&transport, &poller(), &params)
        .await
        .unwrap_err();

    assert!(err.to_string().contains("E1234"));
    assert!(err.to_string().contains("60"));
}

#[tokio::test]
async fn nim_install_auto_picks_the_first_pingable_adapter() {
    let netboot_table = "\
# Type  Location Code   MAC Address   Full Path Name  Ping Result
ent     U78AB-P1-C7-T1  6cae8b021a02  /pci@800/pci@2  failed
ent     U78AB-P1-C7-T2  6cae8b021a03  /pci@800/pci@3  successful
";
    let transport = ScriptedTransport::new()
        .respond(netboot_table)
        .respond("") // installios
        .respond("Running\n")
        .respond("active\n")
        .respond("\n")
        .respond("name=vios1,state=Running,rmc_state=active");

    let result = vios::install(&transport, &poller(), &nim_params())
        .await
        .unwrap();

    assert!(result.changed);
    assert_eq!(transport.count_matching("lpar_netboot"), 1);
    assert!(transport.executed()[1].contains("-l U78AB-P1-C7-T2"));
}

#[tokio::test]
async fn nim_install_fails_when_no_adapter_answers() {
    let transport = ScriptedTransport::new()
        .respond("ent U78AB-P1-C7-T1 6cae8b021a02 /pci@800/pci@2 failed\n");

    let err = vios::install(&transport, &poller(), &nim_params())
        .await
        .unwrap_err();

    assert!(matches!(err, ConvergeError::TargetNotFound(_)));
    assert_eq!(transport.count_matching("installios"), 0);
}

#[tokio::test]
async fn disk_install_uses_the_image_path_and_mac() {
    let params = base_params()
        .with("vios_name", "vios1")
        .with("vios_iso", "vios_4.1.iso")
        .with("image_dir", "vios41")
        .with("vios_ip", "10.0.1.20")
        .with("vios_gateway", "10.0.1.1")
        .with("vios_subnetmask", "255.255.255.0")
        .with("prof_name", "default_profile")
        .with("network_macaddr", "6cae8b021a03");

    let transport = ScriptedTransport::new()
        .respond("") // installios
        .respond("Running\n")
        .respond("active\n")
        .respond("\n")
        .respond("name=vios1,state=Running,rmc_state=active");

    let result = vios::install(&transport, &poller(), &params).await.unwrap();

    assert!(result.changed);
    let command = &transport.executed()[0];
    assert!(command.contains("/extra/viosimages/vios41/vios_4.1.iso"));
    assert!(command.contains("-m 6cae8b021a03"));
}

#[tokio::test]
async fn accept_license_requires_an_active_management_connection() {
    let transport =
        ScriptedTransport::new().respond("name=vios1,state=Running,rmc_state=inactive");

    let params = base_params().with("name", "vios1");
    let err = vios::accept_license(&transport, &params).await.unwrap_err();

    assert!(matches!(err, ConvergeError::Precondition(_)));
    assert!(err.to_string().contains("RMC state is inactive"));
    assert_eq!(transport.count_matching("viosvrcmd"), 0);
}

#[tokio::test]
async fn accept_license_runs_the_license_command() {
    let transport = ScriptedTransport::new()
        .respond("name=vios1,state=Running,rmc_state=active")
        .respond(""); // viosvrcmd

    let params = base_params().with("name", "vios1");
    let result = vios::accept_license(&transport, &params).await.unwrap();

    assert!(result.changed);
    assert_eq!(transport.count_matching("viosvrcmd"), 1);
    assert!(transport.executed()[1].contains("license -accept"));
}

#[tokio::test]
async fn facts_enrich_the_partition_record() {
    let transport = ScriptedTransport::new();
    let rest = ScriptedRest::new()
        .with_system(
            "sys1",
            "uuid-1",
            json!({"SystemName": "sys1", "DetailedState": "None"}),
        )
        .with_vios_list(
            "uuid-1",
            json!([
                {"PartitionName": "other", "UUID": "uuid-8"},
                {"PartitionName": "vios1", "UUID": "uuid-9", "PartitionState": "running"},
            ]),
        )
        .with_vios(
            "uuid-9",
            json!({"MaximumMemory": 8192, "MinimumMemory": 1024}),
        )
        .with_free_pvs("uuid-9", vec![json!({"VolumeName": "hdisk3"})]);

    let params = base_params().with("name", "vios1").with("free_pvs", true);
    let result = vios::facts(&transport, &rest, &params).await.unwrap();

    let info = result.info.unwrap();
    assert_eq!(info["PartitionName"], "vios1");
    assert_eq!(info["MaximumMemory"], 8192);
    assert_eq!(info["FreePhysicalVolumes"][0]["VolumeName"], "hdisk3");
    assert!(rest.closed());
}

#[tokio::test]
async fn facts_degrade_the_volume_inventory_on_failure() {
    let transport = ScriptedTransport::new();
    let rest = ScriptedRest::new()
        .with_system(
            "sys1",
            "uuid-1",
            json!({"SystemName": "sys1", "DetailedState": "None"}),
        )
        .with_vios_list("uuid-1", json!([{"PartitionName": "vios1", "UUID": "uuid-9"}]))
        .with_vios("uuid-9", json!({}))
        .failing_free_pvs();

    let params = base_params().with("name", "vios1").with("free_pvs", true);
    let result = vios::facts(&transport, &rest, &params).await.unwrap();

    let info = result.info.unwrap();
    assert_eq!(info["FreePhysicalVolumes"], json!([]));
}

#[tokio::test]
async fn facts_reject_a_system_in_a_transitional_state() {
    let transport = ScriptedTransport::new();
    let rest = ScriptedRest::new().with_system(
        "sys1",
        "uuid-1",
        json!({"SystemName": "sys1", "DetailedState": "Pending Authentication"}),
    );

    let params = base_params().with("name", "vios1");
    let err = vios::facts(&transport, &rest, &params).await.unwrap_err();

    assert!(err.to_string().contains("Pending Authentication"));
    assert!(rest.closed());
}

#[tokio::test]
async fn facts_for_an_unknown_partition_are_not_found() {
    let transport = ScriptedTransport::new();
    let rest = ScriptedRest::new()
        .with_system(
            "sys1",
            "uuid-1",
            json!({"SystemName": "sys1", "DetailedState": "None"}),
        )
        .with_vios_list("uuid-1", json!([]));

    let params = base_params().with("name", "vios1");
    let err = vios::facts(&transport, &rest, &params).await.unwrap_err();

    assert!(matches!(err, ConvergeError::TargetNotFound(_)));
    assert!(err.to_string().contains("vios1"));
}
