mod comm;
mod lagrange;
mod layout;
mod split;
