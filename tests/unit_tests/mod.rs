mod compressible;
mod layout;
mod shallow_water;
