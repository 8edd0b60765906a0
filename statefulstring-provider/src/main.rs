use statefulstring_resource::framework::run_main;

mod diff;
mod lifecycle;
mod provider;
mod resource;

#[tokio::main]
async fn main() {
    run_main(provider::StatefulStringProvider {}).await
}
