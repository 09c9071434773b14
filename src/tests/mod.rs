mod spherical_harmonics;
