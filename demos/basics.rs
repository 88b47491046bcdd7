use log::info;

use shrd::{make_shared, Shared};

#[derive(Debug)]
struct Config {
    name: String,
    retries: u32,
}

fn main() {
    env_logger::init();

    let config = make_shared(Config {
        name: String::from("demo"),
        retries: 3,
    });

    let workers: Vec<Shared<Config>> = (0..4).map(|_| config.clone()).collect();
    info!("{} handles share {:?}", config.use_count(), *config);

    for (i, worker) in workers.iter().enumerate() {
        println!("worker {i} uses {} with {} retries", worker.name, worker.retries);
    }

    drop(workers);
    println!("handles left: {}", config.use_count());
}
