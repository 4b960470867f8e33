use kube::CustomResourceExt as _;
use krkn_core::api::v1::{ConfigRequest, ProviderRegistration, ScenarioRun, Target, User};

fn main() {
    print!("{}", serde_yaml::to_string(&ProviderRegistration::crd()).unwrap());
    println!("---");
    print!("{}", serde_yaml::to_string(&ConfigRequest::crd()).unwrap());
    println!("---");
    print!("{}", serde_yaml::to_string(&Target::crd()).unwrap());
    println!("---");
    print!("{}", serde_yaml::to_string(&ScenarioRun::crd()).unwrap());
    println!("---");
    print!("{}", serde_yaml::to_string(&User::crd()).unwrap());
}
