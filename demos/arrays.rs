use shrd::{make_shared_array, Shared};

const N: usize = 8;

fn main() {
    env_logger::init();

    let mut squares = make_shared_array::<u64, N>();
    for i in 0..squares.size() {
        squares[i] = (i * i) as u64;
    }

    let reader: Shared<[u64]> = squares.clone();
    println!("{} handles, {} elements", reader.use_count(), reader.size());

    // Writing while shared is refused
    if let Err(err) = squares.try_index_mut(0) {
        println!("{err}");
    }

    for i in 0..=reader.size() {
        match reader.try_index(i) {
            Ok(value) => println!("{i}^2 = {value}"),
            Err(err) => println!("{err}"),
        }
    }
}
